//! 策略文档 URL 解码（查询串语义：`+` 表示空格，`%XX` 为转义字节）

use percent_encoding::percent_decode_str;

use crate::error::{FinderError, FinderResult};

/// 解码 API 返回的策略文档，非法转义或非 UTF-8 结果视为解码失败
pub fn decode_document(name: &str, raw: &str) -> FinderResult<String> {
    let decode_error = |message: String| FinderError::DocumentDecode {
        name: name.to_string(),
        message,
    };

    let bytes = raw.as_bytes();
    for (i, _) in raw.match_indices('%') {
        let escape = bytes.get(i + 1..i + 3).unwrap_or(&[]);
        if escape.len() != 2 || !escape.iter().all(u8::is_ascii_hexdigit) {
            let end = (i + 3).min(raw.len());
            return Err(decode_error(format!(
                "非法的转义序列：{}",
                String::from_utf8_lossy(&bytes[i..end])
            )));
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| decode_error(format!("解码结果不是合法的 UTF-8：{}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_query_escaped_document() {
        let raw = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D";
        assert_eq!(
            decode_document("p", raw).unwrap(),
            r#"{"Version":"2012-10-17","Statement":[]}"#
        );
    }

    #[test]
    fn test_plus_is_space_but_escaped_plus_is_kept() {
        assert_eq!(decode_document("p", "a+b%2Bc").unwrap(), "a b+c");
    }

    #[test]
    fn test_plain_json_passes_through() {
        let raw = r#"{"Statement":[{"Effect":"Allow"}]}"#;
        assert_eq!(decode_document("p", raw).unwrap(), raw);
    }

    #[test]
    fn test_malformed_escape_is_rejected() {
        for raw in ["100%", "%zz", "%4", "ok%2"] {
            match decode_document("broken", raw) {
                Err(FinderError::DocumentDecode { name, .. }) => assert_eq!(name, "broken"),
                other => panic!("expected decode error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        assert!(matches!(
            decode_document("p", "%FF%FE"),
            Err(FinderError::DocumentDecode { .. })
        ));
    }
}
