/// 文リスト
/// 構造化の書き換えはすべてこのリスト上のインデックス操作で行う

use super::statement::{Scope, Statement};
use super::token::{Offset, Token};
use std::ops::Index;
use std::rc::Rc;

/// 開始オフセット順に並んだ文の列
///
/// リストを所有する複合文のスコープを保持し、要素を追加・置換するたびに
/// 各文の親参照をそのスコープへ付け替える。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementList {
    statements: Vec<Statement>,
    scope: Option<Rc<Scope>>,
}

impl StatementList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 親を付け替えずにリストを作る（複合文に設置されたときに付け替わる）
    pub(crate) fn detached(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            scope: None,
        }
    }

    /// (オフセット, トークン) の列から最上位リストを作る
    pub fn from_tokens(tokens: impl IntoIterator<Item = (Offset, Token)>) -> Self {
        let mut list = Self::new();
        for (offset, token) in tokens {
            list.push(Statement::new(offset, token));
        }
        list
    }

    pub fn push(&mut self, mut statement: Statement) {
        statement.set_parent(self.scope.clone());
        self.statements.push(statement);
    }

    pub fn insert(&mut self, index: usize, mut statement: Statement) {
        statement.set_parent(self.scope.clone());
        self.statements.insert(index, statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Statement> {
        self.statements.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Statement> {
        self.statements.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> Statement {
        self.statements.remove(index)
    }

    pub fn last(&self) -> Option<&Statement> {
        self.statements.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }

    /// このリストを所有する複合文のスコープ
    pub fn scope(&self) -> Option<&Rc<Scope>> {
        self.scope.as_ref()
    }

    /// スコープを設定し、全要素の親参照を付け替える
    pub(crate) fn set_scope(&mut self, scope: Option<Rc<Scope>>) {
        for statement in &mut self.statements {
            statement.set_parent(scope.clone());
        }
        self.scope = scope;
    }

    /// 分岐先オフセットに対応するインデックスを探す
    ///
    /// 囲んでいる複合文の終了オフセットと一致する場合はリストの長さを返す
    /// （自ブロックの直後への分岐）。最上位リストでは、すべての文より後ろを
    /// 指す分岐先も本体の終端として扱う。
    pub fn find_by_target_offset(&self, offset: Offset, from_index: usize) -> Option<usize> {
        match &self.scope {
            Some(scope) if scope.end_offset == offset => return Some(self.len()),
            None if self.last().map_or(false, |last| offset > last.start_offset()) => {
                return Some(self.len());
            }
            _ => {}
        }
        self.statements
            .iter()
            .enumerate()
            .skip(from_index)
            .find(|(_, s)| s.start_offset() == offset)
            .map(|(index, _)| index)
    }

    /// [start, start+count) を取り除き、代わりに1つの文を挿入する
    pub fn replace_range(&mut self, start: usize, count: usize, statement: Statement) {
        self.statements.drain(start..start + count);
        self.insert(start, statement);
    }

    /// 部分列を切り出す（親参照はそのまま）
    pub fn get_range(&mut self, start: usize, count: usize) -> StatementList {
        Self::detached(self.statements.drain(start..start + count).collect())
    }

    pub fn remove_range(&mut self, start: usize, count: usize) {
        self.statements.drain(start..start + count);
    }

    /// 自身を囲む複合文から外側へ向かって条件に合うスコープを探す
    pub fn find_parent(&self, pred: impl Fn(&Scope) -> bool) -> Option<&Scope> {
        self.scope.as_deref()?.ancestors().find(|scope| pred(scope))
    }

    pub fn find(&self, pred: impl Fn(&Statement) -> bool) -> Option<&Statement> {
        self.statements.iter().find(|s| pred(s))
    }

    pub fn position(&self, pred: impl Fn(&Statement) -> bool) -> Option<usize> {
        self.statements.iter().position(pred)
    }

    /// 末尾の文が条件を満たす未構造化トークンなら取り除く
    pub fn trim_last(&mut self, pred: impl Fn(&Token) -> bool) -> bool {
        if self.last().map_or(false, |s| s.is_plain(&pred)) {
            self.statements.pop();
            true
        } else {
            false
        }
    }

    /// 省略可能引数のデフォルト値を先頭から取り出す
    ///
    /// 先頭が `Nothing` なら取り除いて `None`、`DefaultParamValue` なら
    /// 取り除いてその値のテキストを返す。
    pub fn take_default_param_value(&mut self) -> Option<String> {
        match self.statements.first().and_then(Statement::token) {
            Some(Token::Nothing) => {
                self.statements.remove(0);
                None
            }
            Some(Token::DefaultParamValue(value)) => {
                let text = value.to_string();
                self.statements.remove(0);
                Some(text)
            }
            _ => None,
        }
    }

    /// ブロックの終端オフセット（switch がリスト末尾まで続く場合に使う）
    pub(crate) fn boundary_offset(&self) -> Offset {
        match &self.scope {
            Some(scope) => scope.end_offset,
            None => self
                .last()
                .map_or(0, |last| last.start_offset().saturating_add(1)),
        }
    }
}

impl Index<usize> for StatementList {
    type Output = Statement;

    fn index(&self, index: usize) -> &Statement {
        &self.statements[index]
    }
}

impl<'a> IntoIterator for &'a StatementList {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structuring::statement::{CompositeKind, ScopeKind};

    fn sample() -> StatementList {
        StatementList::from_tokens([
            (0, Token::expr("A = 1")),
            (10, Token::expr("B = 2")),
            (20, Token::expr("C = 3")),
        ])
    }

    #[test]
    fn test_find_by_target_offset() {
        let list = sample();
        assert_eq!(list.find_by_target_offset(10, 0), Some(1));
        assert_eq!(list.find_by_target_offset(10, 2), None);
        assert_eq!(list.find_by_target_offset(15, 0), None);
        // 最上位リストの終端より後ろ
        assert_eq!(list.find_by_target_offset(99, 0), Some(3));
    }

    #[test]
    fn test_find_by_target_offset_boundary() {
        let mut top = StatementList::new();
        top.push(Statement::composite(0, CompositeKind::Else, sample(), 30));
        let children = &top[0].as_composite().unwrap().children;
        assert_eq!(children.find_by_target_offset(30, 0), Some(3));
        // 入れ子のリストでは終端より後ろは見つからない
        assert_eq!(children.find_by_target_offset(99, 0), None);
    }

    #[test]
    fn test_replace_range_reparents() {
        let mut outer = Statement::composite(0, CompositeKind::Else, sample(), 30);
        let list = &mut outer.as_composite_mut().unwrap().children;
        let body = list.get_range(1, 1);
        assert_eq!(body.len(), 1);
        assert!(body[0].parent().is_some());

        list.replace_range(0, 1, Statement::new(0, Token::expr("X")));
        assert_eq!(list.len(), 2);
        for statement in list.iter() {
            let parent = statement.parent().expect("parent scope");
            assert_eq!(parent.kind, ScopeKind::Else);
            assert_eq!(parent.end_offset, 30);
        }
    }

    #[test]
    fn test_find_parent_after_nesting() {
        let inner = Statement::composite(
            5,
            CompositeKind::If {
                condition: Token::expr("bReady"),
            },
            sample(),
            25,
        );
        let mut loop_body = StatementList::new();
        loop_body.push(inner);
        let outer = Statement::composite(
            0,
            CompositeKind::Foreach {
                collection: Token::expr("AllActors(A)"),
                iterator: None,
            },
            loop_body,
            40,
        );

        // 外側に包まれた後でも内側の子リストから祖先を辿れる
        let loop_body = &outer.as_composite().unwrap().children;
        let children = &loop_body[0].as_composite().unwrap().children;
        let found = children.find_parent(|s| s.kind == ScopeKind::Foreach);
        assert_eq!(found.map(|s| s.end_offset), Some(40));
        assert_eq!(
            children.find_parent(|_| true).map(|s| s.kind),
            Some(ScopeKind::If)
        );
        assert!(children.find_parent(|s| s.kind == ScopeKind::While).is_none());
    }

    #[test]
    fn test_trim_last_and_default_param() {
        let mut list = StatementList::from_tokens([
            (0, Token::DefaultParamValue(Box::new(Token::expr("5")))),
            (4, Token::Nothing),
            (5, Token::expr("Foo()")),
            (9, Token::IteratorPop),
        ]);
        assert!(list.trim_last(|t| matches!(t, Token::IteratorPop)));
        assert!(!list.trim_last(|t| matches!(t, Token::IteratorPop)));
        assert_eq!(list.take_default_param_value(), Some("5".to_string()));
        assert_eq!(list.take_default_param_value(), None);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].start_offset(), 5);
    }
}
