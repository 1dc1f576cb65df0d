//! CGI出力時のヘッダー検証
//!
//! 共通層の検証（トークン・制御文字）より厳しいASCIIホワイトリストで、
//! Webサーバーへ渡す直前に最終確認を行う。

/// 出力してよいヘッダー名か（ASCII英数とハイフンのみ）
pub fn is_valid_header_name(name: &str) -> bool {
    let b = name.as_bytes();
    if b.is_empty() {
        return false;
    }
    b.iter().all(|&c| c.is_ascii_alphanumeric() || c == b'-')
}

/// 出力してよいヘッダー値か
/// 許可: HTAB(0x09), SP(0x20), 可視ASCII(0x21–0x7E)
pub fn is_valid_header_value(value: &str) -> bool {
    value
        .as_bytes()
        .iter()
        .all(|&c| c == b'\t' || c == b' ' || (0x21..=0x7e).contains(&c))
}

/// `Status:` 行に載せる理由句として妥当か
pub fn is_valid_reason_phrase(reason: &str) -> bool {
    !reason.contains('\t') && is_valid_header_value(reason)
}

/// 環境変数から取り出したヘッダーとして受け入れるか
pub fn is_acceptable_request_header(name: &str, value: &str) -> bool {
    is_valid_header_name(name) && is_valid_header_value(value)
}
