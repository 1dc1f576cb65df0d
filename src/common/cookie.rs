//! HTTPクッキー関連の実装（Set-Cookieの生成とCookieヘッダーの解析）

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use crate::error::Error;
use super::utils::{is_header_value_valid, percent_decode, percent_encode, validate_cookie_name_value};

/// SameSite属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// レスポンスで送出するクッキー
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// 新しいクッキーを作成（名前・値はRFC6265の文字種に限定）
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let value = value.into();
        validate_cookie_name_value(&name, &value)?;
        Ok(Self {
            name,
            value,
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        })
    }

    /// 任意の文字列値をパーセントエンコードしてクッキーを作成
    ///
    /// リクエスト側の [`parse_cookie_header`] でデコードされる。
    pub fn encoded(name: impl Into<String>, raw_value: &str) -> Result<Self, Error> {
        Self::new(name, percent_encode(raw_value))
    }

    /// クライアントにクッキーの削除を指示するためのクッキーを作成
    ///
    /// 空の値、`Max-Age=0`、過去の `Expires` を持つ。
    pub fn removal(name: impl Into<String>) -> Result<Self, Error> {
        let mut cookie = Self::new(name, "")?;
        cookie.max_age = Some(Duration::ZERO);
        cookie.expires = Utc.timestamp_opt(1, 0).single();
        Ok(cookie)
    }

    /// パスを設定
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// ドメインを設定
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// 有効期限を設定
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// 最大年齢を設定
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// セキュアフラグを設定
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// HttpOnlyフラグを設定
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// SameSite属性を設定
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Set-Cookieヘッダー値を生成
    pub fn to_header_value(&self) -> String {
        let mut cookie_str = format!("{}={}", self.name, self.value);

        // Path/Domainに ';' が混入すると属性を偽装できる
        let push_text_attr = |out: &mut String, label: &str, value: &str| {
            if is_header_value_valid(value) && !value.contains(';') {
                out.push_str(&format!("; {}={}", label, value));
            } else {
                warn!("Cookie '{}' skipped invalid {} value: {:?}", self.name, label, value);
            }
        };

        if let Some(path) = &self.path {
            push_text_attr(&mut cookie_str, "Path", path);
        }

        if let Some(domain) = &self.domain {
            push_text_attr(&mut cookie_str, "Domain", domain);
        }

        if let Some(expires) = &self.expires {
            cookie_str.push_str(&format!("; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }

        if let Some(max_age) = &self.max_age {
            cookie_str.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }

        if self.secure {
            cookie_str.push_str("; Secure");
        }

        if self.http_only {
            cookie_str.push_str("; HttpOnly");
        }

        if let Some(same_site) = &self.same_site {
            cookie_str.push_str(&format!("; SameSite={}", same_site));
        }

        cookie_str
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// リクエストの `Cookie` ヘッダーを名前と値の組に分解する
///
/// 値はパーセントデコードする。`=` を含まない組は無視し、同名は最初のものを採用する。
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        cookies
            .entry(name.to_string())
            .or_insert_with(|| percent_decode(value));
    }

    cookies
}
