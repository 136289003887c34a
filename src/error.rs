/// 構造化エラー

use crate::structuring::Offset;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// 書き換えパスが上限に達した（循環した分岐など）
    #[error("control flow did not reach a fixed point after {passes} passes (body at offset {offset})")]
    PassLimitExceeded { passes: usize, offset: Offset },

    /// 入力の開始オフセットが昇順になっていない
    #[error("statement offsets must be strictly increasing: {previous} followed by {offset}")]
    InvalidListing { previous: Offset, offset: Offset },
}
