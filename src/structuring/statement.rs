/// 文と複合文
///
/// 親への参照は所有権を持たない `Scope` 記述子で表現する。
/// 所有の方向は常に 複合文 → 子リスト。

use super::statement_list::StatementList;
use super::token::{Offset, Token};
use std::rc::Rc;

/// 複合文の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    If,
    Else,
    While,
    Foreach,
    Switch,
}

impl ScopeKind {
    /// break の対象になるループか
    pub fn is_loop(self) -> bool {
        matches!(self, ScopeKind::While | ScopeKind::Foreach)
    }
}

/// 囲んでいる複合文の記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub start_offset: Offset,
    /// ブロック終了後に制御が戻るオフセット
    pub end_offset: Offset,
    pub parent: Option<Rc<Scope>>,
}

impl Scope {
    /// 自身から外側へ向かって祖先を列挙
    pub fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }
}

/// break / continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Break,
    Continue,
}

impl LoopControl {
    pub fn keyword(self) -> &'static str {
        match self {
            LoopControl::Break => "break",
            LoopControl::Continue => "continue",
        }
    }
}

/// 複合文のヘッダ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeKind {
    If { condition: Token },
    Else,
    While { condition: Token },
    Foreach {
        collection: Token,
        iterator: Option<Token>,
    },
    Switch { discriminant: Token },
}

impl CompositeKind {
    pub fn scope_kind(&self) -> ScopeKind {
        match self {
            CompositeKind::If { .. } => ScopeKind::If,
            CompositeKind::Else => ScopeKind::Else,
            CompositeKind::While { .. } => ScopeKind::While,
            CompositeKind::Foreach { .. } => ScopeKind::Foreach,
            CompositeKind::Switch { .. } => ScopeKind::Switch,
        }
    }

    /// ヘッダ行のテキスト
    pub fn head(&self) -> String {
        match self {
            CompositeKind::If { condition } => format!("if ({})", condition),
            CompositeKind::Else => "else".to_string(),
            CompositeKind::While { condition } => format!("while ({})", condition),
            CompositeKind::Foreach {
                collection,
                iterator,
            } => match iterator {
                Some(iter) => format!("foreach {}({})", collection, iter),
                None => format!("foreach {}", collection),
            },
            CompositeKind::Switch { discriminant } => format!("switch ({})", discriminant),
        }
    }
}

/// 入れ子の本体を持つ構造化された制御文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeStatement {
    pub kind: CompositeKind,
    pub children: StatementList,
    pub end_offset: Offset,
}

impl CompositeStatement {
    pub fn scope_kind(&self) -> ScopeKind {
        self.kind.scope_kind()
    }
}

/// 文の中身
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// 構造化されていないトークン
    Plain(Token),
    /// if / else / while / foreach / switch
    Composite(Box<CompositeStatement>),
    /// 分岐命令から変換された break / continue
    Control { control: LoopControl, token: Token },
}

/// トークン1つ分の文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    start_offset: Offset,
    end_offset: Option<Offset>,
    parent: Option<Rc<Scope>>,
    kind: StatementKind,
}

impl Statement {
    pub fn new(start_offset: Offset, token: Token) -> Self {
        Self {
            start_offset,
            end_offset: None,
            parent: None,
            kind: StatementKind::Plain(token),
        }
    }

    pub fn with_end(start_offset: Offset, end_offset: Offset, token: Token) -> Self {
        Self {
            end_offset: Some(end_offset),
            ..Self::new(start_offset, token)
        }
    }

    /// 複合文を作成し、子リストに自身のスコープを設定する
    ///
    /// 親スコープはリストに挿入された時点で付け替わる。
    pub fn composite(
        start_offset: Offset,
        kind: CompositeKind,
        mut children: StatementList,
        end_offset: Offset,
    ) -> Self {
        let scope = Rc::new(Scope {
            kind: kind.scope_kind(),
            start_offset,
            end_offset,
            parent: None,
        });
        children.set_scope(Some(scope));
        Self {
            start_offset,
            end_offset: None,
            parent: None,
            kind: StatementKind::Composite(Box::new(CompositeStatement {
                kind,
                children,
                end_offset,
            })),
        }
    }

    pub fn control(start_offset: Offset, control: LoopControl, token: Token) -> Self {
        Self {
            start_offset,
            end_offset: None,
            parent: None,
            kind: StatementKind::Control { control, token },
        }
    }

    pub fn start_offset(&self) -> Offset {
        self.start_offset
    }

    pub fn end_offset(&self) -> Option<Offset> {
        self.end_offset
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    /// 親参照を付け替える
    ///
    /// 複合文の場合は子リストのスコープ連鎖も新しい親に合わせて作り直す。
    pub(crate) fn set_parent(&mut self, parent: Option<Rc<Scope>>) {
        if let StatementKind::Composite(composite) = &mut self.kind {
            let current = composite.children.scope().and_then(|s| s.parent.as_ref());
            if !same_scope(current, parent.as_ref()) {
                let scope = Rc::new(Scope {
                    kind: composite.kind.scope_kind(),
                    start_offset: self.start_offset,
                    end_offset: composite.end_offset,
                    parent: parent.clone(),
                });
                composite.children.set_scope(Some(scope));
            }
        }
        self.parent = parent;
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// 構造化されていないトークンのみ返す
    pub fn token(&self) -> Option<&Token> {
        match &self.kind {
            StatementKind::Plain(token) => Some(token),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeStatement> {
        match &self.kind {
            StatementKind::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub(crate) fn as_composite_mut(&mut self) -> Option<&mut CompositeStatement> {
        match &mut self.kind {
            StatementKind::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub(crate) fn into_token(self) -> Option<Token> {
        match self.kind {
            StatementKind::Plain(token) => Some(token),
            _ => None,
        }
    }

    /// トークンが条件を満たす未構造化の文か
    pub fn is_plain(&self, pred: impl Fn(&Token) -> bool) -> bool {
        self.token().map_or(false, pred)
    }

    /// 未変換の分岐命令が残っているか
    pub fn is_raw_jump(&self) -> bool {
        self.is_plain(Token::is_jump)
    }
}

fn same_scope(a: Option<&Rc<Scope>>, b: Option<&Rc<Scope>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}
