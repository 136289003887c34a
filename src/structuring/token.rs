/// バイトコードトークン
/// 外部デコーダが生成する命令トークンの閉じた集合
///
/// 構造化エンジンはこのトークンの種類だけを見てパターンマッチする。
/// 式の中身（条件式やコレクション式）はデコーダがレンダリング済みの文字列として扱う。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 関数/ステート本体内のバイトオフセット
pub type Offset = u32;

/// デコーダが解釈できなかった命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeError {
    /// 出力に埋め込むメッセージ
    pub message: String,
    /// 解釈できなかったオペコード（分かる場合）
    #[serde(default)]
    pub opcode: Option<u8>,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            opcode: None,
        }
    }

    pub fn with_opcode(message: impl Into<String>, opcode: u8) -> Self {
        Self {
            message: message.into(),
            opcode: Some(opcode),
        }
    }
}

/// オフセット → ラベル名
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelTable {
    labels: IndexMap<Offset, String>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: Offset, name: impl Into<String>) {
        self.labels.insert(offset, name.into());
    }

    /// 指定オフセットのラベルを取得
    pub fn label(&self, offset: Offset) -> Option<&str> {
        self.labels.get(&offset).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 別のテーブルの内容を取り込む（後勝ち）
    pub fn merge(&mut self, other: LabelTable) {
        self.labels.extend(other.labels);
    }
}

impl FromIterator<(Offset, String)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (Offset, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// デコード済みトークン
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    /// 通常の式・文
    Expression(String),
    /// 条件が偽なら target へ分岐
    JumpIfNot { condition: Box<Token>, target: Offset },
    /// 無条件分岐
    Jump { target: Offset },
    /// foreach ヘッダ（ループ脱出先 target）
    Foreach {
        collection: Box<Token>,
        #[serde(default)]
        iterator: Option<Box<Token>>,
        target: Offset,
    },
    /// イテレータを次へ進める
    IteratorNext,
    /// イテレータの破棄
    IteratorPop,
    /// switch ヘッダ
    Switch { discriminant: Box<Token> },
    /// case ラベル
    Case(String),
    /// default ラベル
    Default,
    /// return（値は省略可能、デコードエラーの場合もある）
    Return(Option<Box<Token>>),
    /// ステートコードのラベルテーブル
    LabelTable(LabelTable),
    /// 何もしない
    Nothing,
    /// 省略可能引数のデフォルト値
    DefaultParamValue(Box<Token>),
    /// デコードエラー
    Error(DecodeError),
}

impl Token {
    pub fn expr(text: impl Into<String>) -> Self {
        Token::Expression(text.into())
    }

    pub fn ret(value: Option<Token>) -> Self {
        Token::Return(value.map(Box::new))
    }

    /// 分岐命令か（条件付き・無条件の両方）
    pub fn is_jump(&self) -> bool {
        matches!(self, Token::JumpIfNot { .. } | Token::Jump { .. })
    }

    /// 無条件分岐なら分岐先を返す
    pub fn jump_target(&self) -> Option<Offset> {
        match self {
            Token::Jump { target } => Some(*target),
            _ => None,
        }
    }

    pub fn is_case_label(&self) -> bool {
        matches!(self, Token::Case(_) | Token::Default)
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Token::Return(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Token::Error(_))
    }

    /// デコードエラーを含むか（return 値も見る）
    pub fn has_error(&self) -> bool {
        match self {
            Token::Error(_) => true,
            Token::Return(Some(value)) => value.has_error(),
            _ => false,
        }
    }

    /// 値がデコードエラーの return か
    pub fn is_error_return(&self) -> bool {
        matches!(self, Token::Return(Some(value)) if value.is_error())
    }

    /// 値を持たない return か（空文字列にレンダリングされる値も含む）
    pub fn is_valueless_return(&self) -> bool {
        match self {
            Token::Return(None) => true,
            Token::Return(Some(value)) => value.to_string().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Expression(text) => write!(f, "{}", text),
            Token::JumpIfNot { condition, target } => {
                write!(f, "if (!({})) goto {}", condition, target)
            }
            Token::Jump { target } => write!(f, "goto {}", target),
            Token::Foreach {
                collection,
                iterator,
                ..
            } => {
                write!(f, "foreach {}", collection)?;
                if let Some(iter) = iterator {
                    write!(f, "({})", iter)?;
                }
                Ok(())
            }
            Token::IteratorNext => write!(f, "IteratorNext"),
            Token::IteratorPop => write!(f, "IteratorPop"),
            Token::Switch { discriminant } => write!(f, "switch ({})", discriminant),
            Token::Case(text) => write!(f, "case {}", text),
            Token::Default => write!(f, "default"),
            Token::Return(None) => write!(f, "return"),
            Token::Return(Some(value)) => {
                let value = value.to_string();
                if value.is_empty() {
                    write!(f, "return")
                } else {
                    write!(f, "return {}", value)
                }
            }
            Token::LabelTable(_) | Token::Nothing => Ok(()),
            Token::DefaultParamValue(value) => write!(f, "{}", value),
            Token::Error(err) => write!(f, "{}", err.message),
        }
    }
}
