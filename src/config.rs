/// デコンパイル設定
///
/// CLI では JSON ファイルから読み込み、フラグで上書きする。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompileOptions {
    /// false の場合は分岐命令をそのまま出力する
    pub create_control_statements: bool,
    /// 各文の前に `/* offset */` を付ける
    pub show_start_offsets: bool,
    /// インデント1段あたりの空白数
    pub indent_width: usize,
    /// 書き換えパスの上限（None なら文の数 + 1）
    pub max_passes: Option<usize>,
    /// 省略可能引数の数（先頭のデフォルト値トークンを取り出す）
    pub optional_params: usize,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            create_control_statements: true,
            show_start_offsets: false,
            indent_width: 4,
            max_passes: None,
            optional_params: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let options: DecompileOptions =
            serde_json::from_str(r#"{"show_start_offsets": true, "indent_width": 2}"#).unwrap();
        assert!(options.create_control_statements);
        assert!(options.show_start_offsets);
        assert_eq!(options.indent_width, 2);
        assert_eq!(options.max_passes, None);
    }
}
