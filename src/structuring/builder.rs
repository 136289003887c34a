/// 文リストビルダー
/// 手書きのリスティングを組み立てる（テスト・デモ用）

use super::statement::Statement;
use super::statement_list::StatementList;
use super::token::{DecodeError, LabelTable, Offset, Token};

#[derive(Debug, Default)]
pub struct StatementListBuilder {
    list: StatementList,
}

impl StatementListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(mut self, offset: Offset, token: Token) -> Self {
        self.list.push(Statement::new(offset, token));
        self
    }

    /// 通常の文
    pub fn add(self, offset: Offset, text: &str) -> Self {
        self.add_token(offset, Token::expr(text))
    }

    pub fn add_foreach(self, offset: Offset, target: Offset, collection: &str) -> Self {
        self.add_token(
            offset,
            Token::Foreach {
                collection: Box::new(Token::expr(collection)),
                iterator: None,
                target,
            },
        )
    }

    pub fn add_iterator_next(self, offset: Offset) -> Self {
        self.add_token(offset, Token::IteratorNext)
    }

    pub fn add_iterator_pop(self, offset: Offset) -> Self {
        self.add_token(offset, Token::IteratorPop)
    }

    /// 値なしの return
    pub fn add_return(self, offset: Offset) -> Self {
        self.add_token(offset, Token::ret(None))
    }

    pub fn add_return_value(self, offset: Offset, value: &str) -> Self {
        self.add_token(offset, Token::ret(Some(Token::expr(value))))
    }

    /// デコードエラーを値に持つ return
    pub fn add_error_return(self, offset: Offset, message: &str) -> Self {
        self.add_token(offset, Token::ret(Some(Token::Error(DecodeError::new(message)))))
    }

    pub fn add_jump_if_not(self, offset: Offset, target: Offset, condition: &str) -> Self {
        self.add_token(
            offset,
            Token::JumpIfNot {
                condition: Box::new(Token::expr(condition)),
                target,
            },
        )
    }

    pub fn add_jump(self, offset: Offset, target: Offset) -> Self {
        self.add_token(offset, Token::Jump { target })
    }

    pub fn add_switch(self, offset: Offset, discriminant: &str) -> Self {
        self.add_token(
            offset,
            Token::Switch {
                discriminant: Box::new(Token::expr(discriminant)),
            },
        )
    }

    pub fn add_case(self, offset: Offset, label: &str) -> Self {
        self.add_token(offset, Token::Case(label.to_string()))
    }

    pub fn add_default_case(self, offset: Offset) -> Self {
        self.add_token(offset, Token::Default)
    }

    pub fn add_label_table(self, offset: Offset, labels: LabelTable) -> Self {
        self.add_token(offset, Token::LabelTable(labels))
    }

    pub fn build(self) -> StatementList {
        self.list
    }
}
