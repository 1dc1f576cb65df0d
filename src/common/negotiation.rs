//! Acceptヘッダーによるコンテントネゴシエーション
//!
//! `Accept` 形式のヘッダー値を品質値の降順に並んだ [`AcceptList`] へ変換し、
//! サーバーが生成可能なContent-Typeの候補から最適なものを選択する。
//!
//! 照合は大文字小文字を区別する。呼び出し側で正規化すること。

use std::cmp::Ordering;

use log::debug;

/// ワイルドカード文字
const WILDCARD: char = '*';

/// セグメント区切り（`type/subtype`）
const SEGMENT_SEPARATOR: char = '/';

/// q値が無い、または数値として解釈できない場合の既定値
pub const DEFAULT_QUALITY: f64 = 1.0;

/// Acceptヘッダーの1エントリ
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pattern: String,
    quality: f64,
}

impl AcceptEntry {
    /// Content-Typeパターン（`text/*` のようにワイルドカードを含みうる）
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 品質値
    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// ワイルドカードを含むかどうか
    pub fn is_wildcard(&self) -> bool {
        is_wildcard_pattern(&self.pattern)
    }

    /// 具体的なContent-Typeがこのエントリのパターンにマッチするか
    pub fn matches(&self, content_type: &str) -> bool {
        pattern_matches(&self.pattern, content_type)
    }
}

/// 品質値の降順に並んだAcceptエントリの列
///
/// 同じ品質値のエントリはヘッダー内での出現順を保つ。構築後は変更できない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptList {
    entries: Vec<AcceptEntry>,
}

impl AcceptList {
    /// ヘッダー値をパースする
    ///
    /// 不正なエントリ（空のパターンなど）は黙って読み飛ばす。失敗はしない。
    /// 同じパターンが複数回現れた場合は最初の位置を保ち、品質値は後のものを採用する。
    pub fn parse(header: &str) -> Self {
        let mut entries: Vec<AcceptEntry> = Vec::new();

        for raw in header.split(',') {
            let Some((pattern, quality)) = parse_entry(raw) else {
                continue;
            };

            match entries.iter_mut().find(|e| e.pattern == pattern) {
                Some(existing) => existing.quality = quality,
                None => entries.push(AcceptEntry {
                    pattern: pattern.to_string(),
                    quality,
                }),
            }
        }

        // sort_byは安定ソート
        entries.sort_by(|a, b| {
            b.quality
                .partial_cmp(&a.quality)
                .unwrap_or(Ordering::Equal)
        });

        Self { entries }
    }

    /// 空のリストを作成
    pub fn empty() -> Self {
        Self::default()
    }

    /// エントリのスライス
    pub fn entries(&self) -> &[AcceptEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AcceptEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 指定したContent-Typeと完全一致するエントリの品質値
    pub fn quality_of(&self, content_type: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.pattern == content_type)
            .map(|e| e.quality)
    }

    /// 指定したContent-Typeが正の品質値で列挙されているか
    ///
    /// `q=0` は明示的な拒否として扱う。ワイルドカードは展開しない。
    pub fn accepts(&self, content_type: &str) -> bool {
        self.quality_of(content_type).is_some_and(|q| q > 0.0)
    }

    /// 候補の中から最も受理されるContent-Typeのインデックスを返す
    ///
    /// エントリを品質値の順に走査し、最初にマッチした候補を採用する。
    /// ワイルドカードのエントリでは候補の並び順がそのまま優先順位になる。
    pub fn negotiate<S: AsRef<str>>(&self, candidates: &[S]) -> Option<usize> {
        for entry in &self.entries {
            // ワイルドカードでなければ完全一致のみ
            let found = candidates
                .iter()
                .position(|candidate| entry.matches(candidate.as_ref()));

            if let Some(index) = found {
                debug!(
                    "Negotiated content type '{}' (index {}) via pattern '{}' q={}",
                    candidates[index].as_ref(),
                    index,
                    entry.pattern,
                    entry.quality
                );
                return Some(index);
            }
        }

        debug!(
            "No acceptable content type among {} candidate(s)",
            candidates.len()
        );
        None
    }
}

impl<'a> IntoIterator for &'a AcceptList {
    type Item = &'a AcceptEntry;
    type IntoIter = std::slice::Iter<'a, AcceptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// 1エントリを `(パターン, 品質値)` に分解する
fn parse_entry(raw: &str) -> Option<(&str, f64)> {
    let (pattern, params) = match raw.split_once(';') {
        Some((pattern, params)) => (pattern.trim(), Some(params)),
        None => (raw.trim(), None),
    };

    if pattern.is_empty() || pattern.chars().any(char::is_whitespace) {
        return None;
    }

    let quality = params
        .and_then(|params| {
            params.split(';').find_map(|param| {
                let (name, value) = param.split_once('=')?;
                if name.trim().eq_ignore_ascii_case("q") {
                    parse_quality(value.trim())
                } else {
                    None
                }
            })
        })
        .unwrap_or(DEFAULT_QUALITY);

    Some((pattern, quality))
}

/// q値を数値として解釈する（NaN・無限大は不正扱い）
fn parse_quality(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|q| q.is_finite())
}

/// パターンがワイルドカードを含むか
pub fn is_wildcard_pattern(pattern: &str) -> bool {
    pattern.contains(WILDCARD)
}

/// Content-Typeパターンと具体的なContent-Typeを照合する
///
/// ワイルドカードを含まないパターンは完全一致のみ。含む場合は `/` で分割した
/// セグメントごとに照合し、`*` は `/` 以外の0文字以上にマッチする。
/// 照合は文字列全体に対して行う。
pub fn pattern_matches(pattern: &str, content_type: &str) -> bool {
    if !is_wildcard_pattern(pattern) {
        return pattern == content_type;
    }

    let mut pattern_segments = pattern.split(SEGMENT_SEPARATOR);
    let mut type_segments = content_type.split(SEGMENT_SEPARATOR);
    loop {
        match (pattern_segments.next(), type_segments.next()) {
            (Some(p), Some(t)) => {
                if !segment_matches(p, t) {
                    return false;
                }
            }
            (None, None) => return true,
            // セグメント数が異なる
            _ => return false,
        }
    }
}

/// 1セグメントを `*` グロブとして照合する
fn segment_matches(pattern: &str, segment: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let segment: Vec<char> = segment.chars().collect();

    let (mut p, mut s) = (0, 0);
    // 直近の `*` の位置と、そこから消費を再開するセグメント位置
    let mut resume: Option<(usize, usize)> = None;

    while s < segment.len() {
        if p < pattern.len() && pattern[p] == WILDCARD {
            resume = Some((p, s));
            p += 1;
        } else if p < pattern.len() && pattern[p] == segment[s] {
            p += 1;
            s += 1;
        } else if let Some((star, consumed)) = resume {
            p = star + 1;
            s = consumed + 1;
            resume = Some((star, consumed + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == WILDCARD)
}

/// ヘッダー値から受理可能なContent-Typeのリストを構築する
///
/// ヘッダーが存在しなければ空のリスト。
pub fn acceptable_content_types(header: Option<&str>) -> AcceptList {
    header.map(AcceptList::parse).unwrap_or_default()
}

/// ヘッダー値が指定したContent-Typeを正の品質値で受理するか
pub fn accepts(header: Option<&str>, content_type: &str) -> bool {
    acceptable_content_types(header).accepts(content_type)
}

/// ヘッダー値に対して候補から最適なContent-Typeのインデックスを選択する
///
/// 受理可能なものが無ければ `None`。406応答などは呼び出し側で判断する。
pub fn negotiate<S: AsRef<str>>(header: Option<&str>, candidates: &[S]) -> Option<usize> {
    acceptable_content_types(header).negotiate(candidates)
}
