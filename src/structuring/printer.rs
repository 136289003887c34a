/// 構造化済み文リストの出力
/// 入れ子の深さごとに1段インデントした括弧付きソースを生成する

use super::statement::{CompositeKind, Statement, StatementKind};
use super::statement_list::StatementList;
use super::token::{LabelTable, Offset};
use serde::Serialize;

/// 出力行と元のバイトコード範囲の対応
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    /// 0始まりの行番号
    pub line: usize,
    pub start_offset: Offset,
    pub end_offset: Option<Offset>,
}

/// 文リストを人間が読みやすい形式で出力
pub struct StatementPrinter<'a> {
    indent_level: usize,
    indent_width: usize,
    show_start_offsets: bool,
    labels: Option<&'a LabelTable>,
    output: String,
    line: usize,
    source_map: Vec<SourceSpan>,
}

impl<'a> StatementPrinter<'a> {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_width: 4,
            show_start_offsets: false,
            labels: None,
            output: String::new(),
            line: 0,
            source_map: Vec::new(),
        }
    }

    /// 分岐先として残ったオフセットに付けるラベル
    pub fn with_labels(mut self, labels: Option<&'a LabelTable>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    pub fn with_start_offsets(mut self, show: bool) -> Self {
        self.show_start_offsets = show;
        self
    }

    /// 最上位の文のインデント段数
    pub fn with_base_indent(mut self, level: usize) -> Self {
        self.indent_level = level;
        self
    }

    /// 文リストを文字列に変換
    pub fn print(&mut self, list: &StatementList) -> String {
        self.output.clear();
        self.source_map.clear();
        self.line = 0;
        self.print_list(list);
        std::mem::take(&mut self.output)
    }

    /// 直前の `print` で出力した各文の行番号とオフセット範囲
    pub fn source_map(&self) -> &[SourceSpan] {
        &self.source_map
    }

    fn indent(&self) -> String {
        " ".repeat(self.indent_level * self.indent_width)
    }

    fn push_line(&mut self, text: &str) {
        self.output.push_str(&self.indent());
        self.output.push_str(text);
        self.output.push('\n');
        self.line += 1;
    }

    fn print_list(&mut self, list: &StatementList) {
        for statement in list {
            self.print_statement(statement);
        }
    }

    fn print_label(&mut self, offset: Offset) {
        if let Some(label) = self.labels.and_then(|labels| labels.label(offset)) {
            let line = format!("{}:", label);
            self.push_line(&line);
        }
    }

    fn print_statement(&mut self, statement: &Statement) {
        match statement.kind() {
            StatementKind::Plain(token) => {
                let text = token.to_string();
                if text.is_empty() {
                    return;
                }
                self.print_label(statement.start_offset());
                self.source_map.push(SourceSpan {
                    line: self.line,
                    start_offset: statement.start_offset(),
                    end_offset: statement.end_offset(),
                });
                let line = if self.show_start_offsets {
                    format!("/* {} */ {};", statement.start_offset(), text)
                } else {
                    format!("{};", text)
                };
                self.push_line(&line);
            }
            StatementKind::Control { control, .. } => {
                let line = format!("{};", control.keyword());
                self.push_line(&line);
            }
            StatementKind::Composite(composite) => {
                self.print_label(statement.start_offset());
                self.push_line(&composite.kind.head());
                self.push_line("{");
                if let CompositeKind::Switch { .. } = composite.kind {
                    self.print_switch_children(&composite.children);
                } else {
                    self.indent_level += 1;
                    self.print_list(&composite.children);
                    self.indent_level -= 1;
                }
                self.push_line("}");
            }
        }
    }

    /// case/default ラベルは1段、その間の文は2段下げる
    fn print_switch_children(&mut self, children: &StatementList) {
        self.indent_level += 1;
        let mut indented = false;
        for statement in children {
            if let Some(label) = statement.token().filter(|t| t.is_case_label()) {
                if indented {
                    self.indent_level -= 1;
                    indented = false;
                }
                let line = format!("{}:", label);
                self.push_line(&line);
            } else {
                if !indented {
                    self.indent_level += 1;
                    indented = true;
                }
                self.print_statement(statement);
            }
        }
        if indented {
            self.indent_level -= 1;
        }
        self.indent_level -= 1;
    }
}

impl Default for StatementPrinter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// デフォルト設定で出力する
pub fn print_statements(list: &StatementList, labels: Option<&LabelTable>) -> String {
    StatementPrinter::new().with_labels(labels).print(list)
}

/// 出力をテスト用の行リストと比較しやすくする
#[cfg(test)]
pub(crate) fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structuring::statement::LoopControl;
    use crate::structuring::token::Token;

    #[test]
    fn test_print_plain_statements() {
        let list = StatementList::from_tokens([
            (0, Token::expr("I = 0")),
            (5, Token::Nothing),
            (6, Token::ret(None)),
        ]);
        let text = print_statements(&list, None);
        assert_eq!(lines(&text), vec!["I = 0;", "return;"]);
    }

    #[test]
    fn test_print_composite_and_labels() {
        let mut body = StatementList::new();
        body.push(Statement::new(12, Token::expr("Sleep(1.0)")));
        body.push(Statement::control(20, LoopControl::Break, Token::Jump { target: 40 }));
        let mut list = StatementList::new();
        list.push(Statement::composite(
            10,
            CompositeKind::While {
                condition: Token::expr("bActive"),
            },
            body,
            40,
        ));
        list.push(Statement::new(40, Token::Jump { target: 10 }));

        let mut labels = LabelTable::new();
        labels.insert(10, "Begin");
        labels.insert(40, "Done");

        let text = print_statements(&list, Some(&labels));
        assert_eq!(
            lines(&text),
            vec![
                "Begin:",
                "while (bActive)",
                "{",
                "    Sleep(1.0);",
                "    break;",
                "}",
                "Done:",
                "goto 10;",
            ]
        );
    }

    #[test]
    fn test_print_switch_indentation() {
        let children = StatementList::from_tokens([
            (3, Token::Case("0".into())),
            (5, Token::Case("1".into())),
            (7, Token::expr("A()")),
            (9, Token::Default),
            (10, Token::expr("B()")),
        ]);
        let mut list = StatementList::new();
        list.push(Statement::composite(
            0,
            CompositeKind::Switch {
                discriminant: Token::expr("Mode"),
            },
            children,
            20,
        ));

        let text = StatementPrinter::new().with_indent_width(2).print(&list);
        assert_eq!(
            lines(&text),
            vec![
                "switch (Mode)",
                "{",
                "  case 0:",
                "  case 1:",
                "    A();",
                "  default:",
                "    B();",
                "}",
            ]
        );
    }

    #[test]
    fn test_start_offsets_and_source_map() {
        let mut list = StatementList::new();
        list.push(Statement::with_end(0, 6, Token::expr("X = 1")));
        list.push(Statement::new(6, Token::ret(Some(Token::expr("X")))));

        let mut printer = StatementPrinter::new().with_start_offsets(true).with_base_indent(1);
        let text = printer.print(&list);
        assert_eq!(lines(&text), vec!["    /* 0 */ X = 1;", "    /* 6 */ return X;"]);
        assert_eq!(
            printer.source_map(),
            &[
                SourceSpan {
                    line: 0,
                    start_offset: 0,
                    end_offset: Some(6)
                },
                SourceSpan {
                    line: 1,
                    start_offset: 6,
                    end_offset: None
                },
            ]
        );
    }
}
