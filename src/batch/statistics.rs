//! バッチ処理の集計値

use std::collections::BTreeMap;

use serde::Serialize;

/// アクションごとの処理件数とエラー件数
///
/// 共有された可変マップではなく値として扱い、
/// 呼び出し側が [`BatchStatistics::merge`] で合算します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStatistics {
    counts: BTreeMap<String, usize>,
    errors: usize,
}

impl BatchStatistics {
    /// 空の集計値を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// アクションの件数を 1 増やす
    pub fn increment(&mut self, action: &str) {
        *self.counts.entry(action.to_string()).or_default() += 1;
    }

    /// エラー件数を 1 増やす
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// アクションの件数
    pub fn count(&self, action: &str) -> usize {
        self.counts.get(action).copied().unwrap_or_default()
    }

    /// エラー件数
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// 全アクションの合計件数
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// アクションと件数の一覧（アクション名順）
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(action, count)| (action.as_str(), *count))
    }

    /// 別の集計値を合算する
    pub fn merge(&mut self, other: &BatchStatistics) {
        for (action, count) in &other.counts {
            *self.counts.entry(action.clone()).or_default() += count;
        }
        self.errors += other.errors;
    }
}

impl std::fmt::Display for BatchStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (action, count) in &self.counts {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{action}={count}")?;
            first = false;
        }
        if !first {
            write!(f, ", ")?;
        }
        write!(f, "errors={}", self.errors)
    }
}
