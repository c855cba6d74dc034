use serde::{Deserialize, Serialize};
use std::fmt;

/// Bookの識別子。形式はバックエンドごとに異なる。
///
/// JSON上はuntagged: `Sequence` は数値、`Document` はUUID文字列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookId {
    /// インメモリストアの連番（1始まり、プロセス内で再利用しない）
    Sequence(u64),
    /// ドキュメントストアのネイティブID
    Document(uuid::Uuid),
}

impl BookId {
    pub fn new_document() -> Self {
        Self::Document(uuid::Uuid::new_v4())
    }

    /// 文字列をドキュメントIDとして解釈する。UUIDでなければNone。
    pub fn parse_document(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw).ok().map(Self::Document)
    }

    /// 文字列を連番IDとして解釈する。先頭ゼロは許容する（"01" == 1）。
    pub fn parse_sequence(raw: &str) -> Option<Self> {
        raw.parse::<u64>().ok().map(Self::Sequence)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(n) => write!(f, "{n}"),
            Self::Document(uuid) => write!(f, "{uuid}"),
        }
    }
}
