/// 制御構造の復元
///
/// 分岐命令の列から if / else / while / foreach / switch / break / continue を
/// 再構成する。1パスで最初に成功した書き換えの直後にパスを打ち切り、
/// 書き換えが起きなくなるまで先頭からやり直す（インデックスが無効になるため）。
///
/// 認識するパターンはレガシーコンパイラのコード生成イディオムそのもの:
///
/// ```text
/// if:       JumpIfNot(cond, END) body... END:
/// if-else:  JumpIfNot(cond, ELSE) body... Jump(END) ELSE: body... END:
/// while:    HEAD: JumpIfNot(cond, END) body... Jump(HEAD) END:
/// foreach:  Foreach(expr, POP) body... IteratorNext POP: IteratorPop
/// switch:   Switch(expr) case: ... Jump(END) case: ... END:
/// ```

use super::statement::{CompositeKind, LoopControl, Scope, ScopeKind, Statement, StatementKind};
use super::statement_list::StatementList;
use super::token::{Offset, Token};
use crate::error::StructureError;
use tracing::{debug, warn};

/// パス内で見つかった書き換え候補
enum Candidate {
    Branch { condition: Token, target: Offset },
    Jump { target: Offset },
    Foreach {
        collection: Token,
        iterator: Option<Token>,
        target: Offset,
    },
    Switch { discriminant: Token },
}

impl Candidate {
    fn from_statement(statement: &Statement) -> Option<Self> {
        match statement.token()? {
            Token::JumpIfNot { condition, target } => Some(Candidate::Branch {
                condition: (**condition).clone(),
                target: *target,
            }),
            Token::Jump { target } => Some(Candidate::Jump { target: *target }),
            Token::Foreach {
                collection,
                iterator,
                target,
            } => Some(Candidate::Foreach {
                collection: (**collection).clone(),
                iterator: iterator.as_deref().cloned(),
                target: *target,
            }),
            Token::Switch { discriminant } => Some(Candidate::Switch {
                discriminant: (**discriminant).clone(),
            }),
            _ => None,
        }
    }
}

impl StatementList {
    /// 不動点に達するまで制御構造を作る
    ///
    /// パス数の上限は文の数 + 1。正しい入力では書き換え1回ごとに分岐系の
    /// トークンが1つ以上消えるため、この上限には達しない。
    pub fn create_control_statements(&mut self) -> Result<(), StructureError> {
        let max_passes = self.len() + 1;
        self.create_control_statements_with_limit(max_passes)
    }

    pub fn create_control_statements_with_limit(
        &mut self,
        max_passes: usize,
    ) -> Result<(), StructureError> {
        let mut passes = 0;
        while self.create_control_statements_pass()? {
            passes += 1;
            if passes > max_passes {
                let offset = self.get(0).map_or(0, Statement::start_offset);
                warn!(
                    "Control flow at offset {} did not converge after {} passes",
                    offset, passes
                );
                return Err(StructureError::PassLimitExceeded { passes, offset });
            }
        }
        Ok(())
    }

    fn create_control_statements_pass(&mut self) -> Result<bool, StructureError> {
        for i in 0..self.len() {
            let candidate = match Candidate::from_statement(&self[i]) {
                Some(candidate) => candidate,
                None => continue,
            };

            let rewritten = match candidate {
                Candidate::Branch { condition, target } => {
                    match self.find_by_target_offset(target, 0) {
                        // 後方への条件分岐は構造化しない
                        Some(if_end) if if_end > i => {
                            self.create_if_statement(i, condition, target, if_end)?;
                            true
                        }
                        _ => false,
                    }
                }
                Candidate::Jump { target } => self.create_break_continue(i, target),
                Candidate::Foreach {
                    collection,
                    iterator,
                    target,
                } => {
                    // IteratorPop はループ脱出先の1バイト後ろに置かれる
                    let end = target
                        .checked_add(1)
                        .and_then(|pop_end| self.find_by_target_offset(pop_end, i + 1));
                    match end {
                        Some(foreach_end) => {
                            self.create_foreach_statement(
                                i,
                                collection,
                                iterator,
                                target,
                                foreach_end,
                            )?;
                            true
                        }
                        None => false,
                    }
                }
                Candidate::Switch { discriminant } => {
                    self.create_switch_statement(i, discriminant)?
                }
            };

            if rewritten {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 分岐先を終端とする囲みループ（foreach / while）を探す
    fn find_loop_exit(&self, target: Offset) -> Option<&Scope> {
        self.find_parent(|scope| scope.kind.is_loop() && scope.end_offset == target)
    }

    fn create_if_statement(
        &mut self,
        i: usize,
        condition: Token,
        target: Offset,
        if_end: usize,
    ) -> Result<(), StructureError> {
        let start = self[i].start_offset();
        let mut body_end = if_end;
        let mut if_end_offset = target;
        let mut is_while = false;
        let mut else_range = None;

        if let Some(jump_target) = self[if_end - 1].token().and_then(Token::jump_target) {
            if jump_target == start {
                // 本体末尾の後方分岐は while の戻り辺（子の構造化後に取り除く）
                is_while = true;
            } else if self.find_loop_exit(jump_target).is_none() {
                match self.find_by_target_offset(jump_target, if_end + 1) {
                    Some(else_end) if else_end > if_end => {
                        if_end_offset = self[if_end - 1].start_offset();
                        body_end = if_end - 1;
                        else_range = Some((if_end, else_end, jump_target));
                    }
                    _ => {}
                }
            }
        }

        // 後ろの範囲から切り出してインデックスを保つ
        let else_statement = else_range.map(|(from, to, else_end_offset)| {
            let else_start = self[from].start_offset();
            let children = self.get_range(from, to - from);
            Statement::composite(else_start, CompositeKind::Else, children, else_end_offset)
        });
        let body = self.get_range(i + 1, body_end - i - 1);

        let kind = if is_while {
            debug!("while at {} (end {})", start, target);
            CompositeKind::While { condition }
        } else {
            debug!("if at {} (end {})", start, if_end_offset);
            CompositeKind::If { condition }
        };
        // 条件分岐と、else がある場合は then 末尾の無条件分岐を置き換える
        let consumed = 1 + (if_end - body_end);
        self.replace_range(i, consumed, Statement::composite(start, kind, body, if_end_offset));
        self.process_children(i)?;

        if let Some(else_statement) = else_statement {
            debug!("else at {}", else_statement.start_offset());
            self.insert(i + 1, else_statement);
            self.process_children(i + 1)?;
        }
        Ok(())
    }

    fn create_break_continue(&mut self, i: usize, target: Offset) -> bool {
        let loop_kind = match self.find_loop_exit(target) {
            Some(scope) => scope.kind,
            None => return false,
        };
        let start = self[i].start_offset();
        let token = Token::Jump { target };

        let after_next = i > 0 && self[i - 1].is_plain(|t| matches!(t, Token::IteratorNext));
        if loop_kind == ScopeKind::Foreach && after_next {
            debug!("continue at {}", start);
            self.replace_range(i - 1, 2, Statement::control(start, LoopControl::Continue, token));
        } else {
            debug!("break at {}", start);
            self.replace_range(i, 1, Statement::control(start, LoopControl::Break, token));
        }
        true
    }

    fn create_foreach_statement(
        &mut self,
        i: usize,
        collection: Token,
        iterator: Option<Token>,
        target: Offset,
        foreach_end: usize,
    ) -> Result<(), StructureError> {
        let start = self[i].start_offset();
        debug!("foreach at {} (end {})", start, target);
        let body = self.get_range(i + 1, foreach_end - i - 1);
        let kind = CompositeKind::Foreach {
            collection,
            iterator,
        };
        self.replace_range(i, 1, Statement::composite(start, kind, body, target));
        self.process_children(i)
    }

    fn create_switch_statement(
        &mut self,
        i: usize,
        discriminant: Token,
    ) -> Result<bool, StructureError> {
        let (end_index, end_offset) = match self.find_switch_end(i + 1) {
            Some(end) => end,
            None => return Ok(false),
        };
        let start = self[i].start_offset();
        debug!("switch at {} (end {})", start, end_offset);
        let body = self.get_range(i + 1, end_index - i - 1);
        let kind = CompositeKind::Switch { discriminant };
        self.replace_range(i, 1, Statement::composite(start, kind, body, end_offset));
        self.process_children(i)?;
        Ok(true)
    }

    /// switch の終端（インデックスとオフセット）を探す
    ///
    /// 1. 直前が無条件分岐の case/default ラベル → その分岐先
    /// 2. 末尾のデコードエラー return
    /// 3. リストの終端
    ///
    /// 1 の分岐先が見つからない場合や、先に未構造化の switch が現れた場合は
    /// 後のパスに回す。
    fn find_switch_end(&self, from: usize) -> Option<(usize, Offset)> {
        for j in from..self.len() {
            let statement = &self[j];
            if statement.is_plain(Token::is_case_label) {
                if let Some(target) = self[j - 1].token().and_then(Token::jump_target) {
                    let end_index = self.find_by_target_offset(target, j)?;
                    return Some((end_index, target));
                }
            }
            if statement.is_plain(|t| matches!(t, Token::Switch { .. })) {
                return None;
            }
        }
        match self.last() {
            Some(last) if self.len() > from && last.is_plain(Token::is_error_return) => {
                Some((self.len() - 1, last.start_offset()))
            }
            _ => Some((self.len(), self.boundary_offset())),
        }
    }

    /// 新しく作った複合文の子を構造化し、種類ごとの後処理を行う
    fn process_children(&mut self, index: usize) -> Result<(), StructureError> {
        let Some(statement) = self.get_mut(index) else {
            return Ok(());
        };
        let start = statement.start_offset();
        let Some(composite) = statement.as_composite_mut() else {
            return Ok(());
        };

        composite.children.create_control_statements()?;
        match composite.kind {
            CompositeKind::While { .. } => {
                composite
                    .children
                    .trim_last(|t| t.jump_target() == Some(start));
            }
            CompositeKind::Foreach { .. } => {
                composite
                    .children
                    .trim_last(|t| matches!(t, Token::IteratorPop));
                composite
                    .children
                    .trim_last(|t| matches!(t, Token::IteratorNext));
                remove_redundant_pops(&mut composite.children);
            }
            CompositeKind::Switch { .. } => {
                replace_jumps_with_breaks(&mut composite.children, composite.end_offset);
                composite.children.trim_last(|t| matches!(t, Token::Default));
            }
            CompositeKind::If { .. } | CompositeKind::Else => {}
        }
        Ok(())
    }

    /// 末尾のデコードエラー return を取り除く（ストリーム終端の産物）
    pub fn remove_trailing_error_return(&mut self) -> bool {
        self.trim_last(Token::is_error_return)
    }

    /// 冗長な return を取り除く
    ///
    /// 分岐がすべて構造化できた場合に限り、最上位の最初の return 以降を
    /// 削除する。値を持たない return はそれ自体も削除する。
    pub fn remove_redundant_returns(&mut self) {
        self.remove_trailing_error_return();
        if self.is_incomplete_control_flow() {
            return;
        }
        if let Some(i) = self.position(|s| s.is_plain(Token::is_return)) {
            let len = self.len();
            if self[i].is_plain(Token::is_valueless_return) {
                self.remove_range(i, len - i);
            } else {
                self.remove_range(i + 1, len - i - 1);
            }
        }
    }

    /// 未変換の分岐命令がツリーのどこかに残っているか
    pub fn is_incomplete_control_flow(&self) -> bool {
        self.any_statement(&|s: &Statement| s.is_raw_jump())
    }

    /// デコードエラーを含む文がツリーのどこかにあるか
    pub fn has_errors(&self) -> bool {
        self.any_statement(&|s: &Statement| match s.kind() {
            StatementKind::Plain(token) => token.has_error(),
            StatementKind::Composite(composite) => match &composite.kind {
                CompositeKind::If { condition } | CompositeKind::While { condition } => {
                    condition.has_error()
                }
                CompositeKind::Foreach { collection, .. } => collection.has_error(),
                CompositeKind::Switch { discriminant } => discriminant.has_error(),
                CompositeKind::Else => false,
            },
            StatementKind::Control { .. } => false,
        })
    }

    fn any_statement(&self, pred: &dyn Fn(&Statement) -> bool) -> bool {
        self.iter().any(|statement| {
            pred(statement)
                || statement
                    .as_composite()
                    .map_or(false, |composite| composite.children.any_statement(pred))
        })
    }
}

/// return 直前の IteratorPop を入れ子の中まで取り除く
fn remove_redundant_pops(list: &mut StatementList) {
    let mut i = 0;
    while i < list.len() {
        if let Some(composite) = list.get_mut(i).and_then(Statement::as_composite_mut) {
            remove_redundant_pops(&mut composite.children);
        } else if i + 1 < list.len()
            && list[i].is_plain(|t| matches!(t, Token::IteratorPop))
            && list[i + 1].is_plain(Token::is_return)
        {
            list.remove_range(i, 1);
        }
        i += 1;
    }
}

/// switch 直下の終端への分岐を break にする（return 直後なら削除）
fn replace_jumps_with_breaks(children: &mut StatementList, end_offset: Offset) {
    let mut i = 0;
    while i < children.len() {
        if children[i].token().and_then(Token::jump_target) == Some(end_offset) {
            if i > 0 && children[i - 1].is_plain(Token::is_return) {
                children.remove_range(i, 1);
                continue;
            }
            let start = children[i].start_offset();
            let token = Token::Jump { target: end_offset };
            children.replace_range(i, 1, Statement::control(start, LoopControl::Break, token));
        }
        i += 1;
    }
}
