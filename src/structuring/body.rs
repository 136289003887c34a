/// 関数・ステート本体のデコンパイル
///
/// デコード済みリスティングを受け取り、構造化してテキストに変換する。
/// 本体ごとに独立しているため、複数の本体を並列に処理できる。

use super::printer::{SourceSpan, StatementPrinter};
use super::statement::Statement;
use super::statement_list::StatementList;
use super::token::{LabelTable, Offset, Token};
use crate::config::DecompileOptions;
use crate::error::StructureError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// リスティングの1エントリ（JSON 入力形式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub offset: Offset,
    /// 命令の終了オフセット（分かる場合）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<Offset>,
    pub token: Token,
}

impl ListingEntry {
    pub fn new(offset: Offset, token: Token) -> Self {
        Self {
            offset,
            end_offset: None,
            token,
        }
    }
}

/// 1つの本体のデコンパイル結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecompiledBody {
    pub text: String,
    /// デコードエラーを含む
    pub has_errors: bool,
    /// 構造化できなかった分岐命令が残っている
    pub incomplete_control_flow: bool,
    /// 省略可能引数のデフォルト値（引数順）
    pub default_values: Vec<Option<String>>,
    pub source_map: Vec<SourceSpan>,
}

/// 本体デコンパイラ
#[derive(Debug, Clone, Default)]
pub struct BodyDecompiler {
    options: DecompileOptions,
}

impl BodyDecompiler {
    pub fn new(options: DecompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecompileOptions {
        &self.options
    }

    /// リスティングを検証して文リストに変換し、デコンパイルする
    pub fn decompile_listing(
        &self,
        listing: Vec<ListingEntry>,
    ) -> Result<DecompiledBody, StructureError> {
        validate_offsets(&listing)?;

        let mut list = StatementList::new();
        for entry in listing {
            let statement = match entry.end_offset {
                Some(end) => Statement::with_end(entry.offset, end, entry.token),
                None => Statement::new(entry.offset, entry.token),
            };
            list.push(statement);
        }
        Ok(self.decompile(list))
    }

    /// 文リストをデコンパイルする
    ///
    /// 構造化の失敗は致命的ではなく、`incomplete_control_flow` として報告する。
    pub fn decompile(&self, mut list: StatementList) -> DecompiledBody {
        let labels = extract_labels(&mut list);
        let default_values: Vec<Option<String>> = (0..self.options.optional_params)
            .map(|_| list.take_default_param_value())
            .collect();
        let has_errors = list.has_errors();

        let mut incomplete_control_flow = false;
        if self.options.create_control_statements {
            let result = match self.options.max_passes {
                Some(max_passes) => list.create_control_statements_with_limit(max_passes),
                None => list.create_control_statements(),
            };
            if let Err(e) = result {
                warn!("{}", e);
                incomplete_control_flow = true;
            }
            list.remove_redundant_returns();
        }
        if list.is_incomplete_control_flow() {
            incomplete_control_flow = true;
        }
        if incomplete_control_flow && self.options.create_control_statements {
            let offset = list.get(0).map_or(0, Statement::start_offset);
            warn!("Incomplete control flow in body at offset {}", offset);
        }

        let mut printer = StatementPrinter::new()
            .with_labels((!labels.is_empty()).then_some(&labels))
            .with_indent_width(self.options.indent_width)
            .with_start_offsets(self.options.show_start_offsets);
        let text = printer.print(&list);
        debug!(
            "Decompiled body: {} lines, {} labels",
            text.lines().count(),
            labels.len()
        );

        DecompiledBody {
            text,
            has_errors,
            incomplete_control_flow,
            default_values,
            source_map: printer.source_map().to_vec(),
        }
    }

    /// 複数の本体をまとめてデコンパイル（結果は入力順）
    pub fn decompile_bodies(
        &self,
        listings: Vec<Vec<ListingEntry>>,
    ) -> Vec<Result<DecompiledBody, StructureError>> {
        #[cfg(feature = "parallel")]
        let results: Vec<_> = {
            use rayon::prelude::*;

            listings
                .into_par_iter()
                .map(|listing| self.decompile_listing(listing))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = listings
            .into_iter()
            .map(|listing| self.decompile_listing(listing))
            .collect();

        results
    }
}

fn validate_offsets(listing: &[ListingEntry]) -> Result<(), StructureError> {
    for pair in listing.windows(2) {
        let (previous, offset) = (pair[0].offset, pair[1].offset);
        if offset <= previous {
            return Err(StructureError::InvalidListing { previous, offset });
        }
    }
    Ok(())
}

/// ラベルテーブル文を取り除き、1つのテーブルにまとめる
fn extract_labels(list: &mut StatementList) -> LabelTable {
    let mut labels = LabelTable::new();
    while let Some(index) = list.position(|s| s.is_plain(|t| matches!(t, Token::LabelTable(_)))) {
        if let Some(Token::LabelTable(table)) = list.remove(index).into_token() {
            labels.merge(table);
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structuring::builder::StatementListBuilder;
    use crate::structuring::printer::lines;

    fn entry(offset: Offset, token: Token) -> ListingEntry {
        ListingEntry::new(offset, token)
    }

    #[test]
    fn test_decompile_listing() {
        let listing = vec![
            entry(0, Token::JumpIfNot {
                condition: Box::new(Token::expr("bEnabled")),
                target: 10,
            }),
            entry(5, Token::expr("Fire()")),
            entry(10, Token::ret(None)),
        ];
        let body = BodyDecompiler::default().decompile_listing(listing).unwrap();
        assert_eq!(lines(&body.text), vec!["if (bEnabled)", "{", "    Fire();", "}"]);
        assert!(!body.has_errors);
        assert!(!body.incomplete_control_flow);
        assert!(body.default_values.is_empty());
    }

    #[test]
    fn test_invalid_listing() {
        let listing = vec![
            entry(0, Token::expr("A()")),
            entry(8, Token::expr("B()")),
            entry(8, Token::expr("C()")),
        ];
        let err = BodyDecompiler::default().decompile_listing(listing).unwrap_err();
        assert_eq!(
            err,
            StructureError::InvalidListing {
                previous: 8,
                offset: 8
            }
        );
    }

    #[test]
    fn test_labels_for_unresolved_jumps() {
        let mut labels = LabelTable::new();
        labels.insert(0, "Begin");
        let mut list = StatementListBuilder::new()
            .add_label_table(0, labels)
            .add(1, "Sleep(1.0)")
            .add_jump(6, 1)
            .build();
        let mut table = LabelTable::new();
        table.insert(1, "Loop");
        list.push(Statement::new(9, Token::LabelTable(table)));

        let body = BodyDecompiler::default().decompile(list);
        assert!(body.incomplete_control_flow);
        assert_eq!(lines(&body.text), vec!["Loop:", "Sleep(1.0);", "goto 1;"]);
    }

    #[test]
    fn test_default_param_values() {
        let options = DecompileOptions {
            optional_params: 2,
            ..Default::default()
        };
        let listing = vec![
            entry(0, Token::DefaultParamValue(Box::new(Token::expr("1.0")))),
            entry(4, Token::Nothing),
            entry(5, Token::expr("Scale = S")),
            entry(9, Token::ret(None)),
        ];
        let body = BodyDecompiler::new(options).decompile_listing(listing).unwrap();
        assert_eq!(body.default_values, vec![Some("1.0".to_string()), None]);
        assert_eq!(lines(&body.text), vec!["Scale = S;"]);
    }

    #[test]
    fn test_raw_mode() {
        let options = DecompileOptions {
            create_control_statements: false,
            show_start_offsets: true,
            ..Default::default()
        };
        let list = StatementListBuilder::new()
            .add_jump_if_not(0, 10, "bReady")
            .add(5, "Go()")
            .add_return(10)
            .build();
        let body = BodyDecompiler::new(options).decompile(list);
        assert!(body.incomplete_control_flow);
        assert_eq!(
            lines(&body.text),
            vec![
                "/* 0 */ if (!(bReady)) goto 10;",
                "/* 5 */ Go();",
                "/* 10 */ return;",
            ]
        );
        assert_eq!(body.source_map.len(), 3);
        assert_eq!(body.source_map[2].start_offset, 10);
    }

    #[test]
    fn test_pass_limit_marks_incomplete() {
        let options = DecompileOptions {
            max_passes: Some(0),
            ..Default::default()
        };
        let list = StatementListBuilder::new()
            .add_jump_if_not(0, 10, "A")
            .add(5, "B()")
            .add_jump_if_not(10, 20, "C")
            .add(15, "D()")
            .build();
        let body = BodyDecompiler::new(options).decompile(list);
        assert!(body.incomplete_control_flow);
        assert!(!body.text.is_empty());
    }

    #[test]
    fn test_has_errors_survives_elision() {
        let list = StatementListBuilder::new()
            .add(0, "Foo()")
            .add_error_return(4, "/* unknown opcode 0x5A */")
            .build();
        let body = BodyDecompiler::default().decompile(list);
        assert!(body.has_errors);
        assert_eq!(lines(&body.text), vec!["Foo();"]);
    }

    #[test]
    fn test_decompile_bodies_in_order() {
        let listings = vec![
            vec![entry(0, Token::expr("First()")), entry(4, Token::ret(None))],
            vec![entry(4, Token::expr("Bad()")), entry(0, Token::ret(None))],
            vec![entry(0, Token::expr("Third()"))],
        ];
        let results = BodyDecompiler::default().decompile_bodies(listings);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().text, "First();\n");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().text, "Third();\n");
    }

    #[test]
    fn test_listing_json() {
        let json = r#"[
            {"offset": 0, "token": {"foreach": {"collection": {"expression": "AllActors(Class'Pawn', P)"}, "target": 20}}},
            {"offset": 10, "end_offset": 18, "token": {"expression": "P.Kill()"}},
            {"offset": 19, "token": "iterator_next"},
            {"offset": 20, "token": "iterator_pop"},
            {"offset": 21, "token": {"return": null}}
        ]"#;
        let listing: Vec<ListingEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(listing[1].end_offset, Some(18));

        let body = BodyDecompiler::default().decompile_listing(listing).unwrap();
        assert_eq!(
            lines(&body.text),
            vec!["foreach AllActors(Class'Pawn', P)", "{", "    P.Kill();", "}"]
        );
        assert_eq!(body.source_map[0].line, 2);
        assert_eq!(body.source_map[0].end_offset, Some(18));
    }
}
