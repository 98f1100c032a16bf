//! One-shot notices carried across a redirect in a cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use serde::Serialize;

pub const FLASH_COOKIE: &str = "late_policy_flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Flash {
    Notice(String),
    Error(String),
}

impl Flash {
    pub fn kind(&self) -> &'static str {
        match self {
            Flash::Notice(_) => "notice",
            Flash::Error(_) => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Flash::Notice(message) | Flash::Error(message) => message,
        }
    }

    /// Messages may hold several newline-separated lines.
    pub fn lines(&self) -> Vec<&str> {
        self.message().lines().filter(|l| !l.is_empty()).collect()
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.kind(), urlencoding::encode(self.message()))
    }

    fn decode(raw: &str) -> Option<Self> {
        let (kind, encoded) = raw.split_once(':')?;
        let message = urlencoding::decode(encoded).ok()?.into_owned();
        match kind {
            "notice" => Some(Flash::Notice(message)),
            "error" => Some(Flash::Error(message)),
            _ => None,
        }
    }

    /// `Set-Cookie` value storing this flash for the next page.
    pub fn set_cookie(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            FLASH_COOKIE,
            self.encode()
        ))
        .ok()
    }

    /// The flash sent with a request, if any.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        read_cookie(headers, FLASH_COOKIE).and_then(|raw| Flash::decode(&raw))
    }
}

/// `Set-Cookie` value that expires the flash once it has been shown.
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("late_policy_flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Value of the named cookie across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
