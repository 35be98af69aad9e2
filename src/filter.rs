/// 絞り込み用のクエリ入力
///
/// PR テーブルのタイトルフィルタとフィルタモーダルで共通に使う。
/// カーソルは char 単位で持ち、マルチバイト文字でも安全に編集できる。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInput {
    query: String,
    cursor_chars: usize,
}

impl QueryInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    /// カーソル位置に文字を挿入する
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.byte_pos(self.cursor_chars);
        self.query.insert(byte_pos, c);
        self.cursor_chars += 1;
    }

    /// カーソル位置の手前の文字を削除する（Backspace）
    pub fn delete_char(&mut self) {
        if self.cursor_chars == 0 {
            return;
        }
        self.cursor_chars -= 1;
        let start = self.byte_pos(self.cursor_chars);
        let end = self.byte_pos(self.cursor_chars + 1);
        self.query.replace_range(start..end, "");
    }

    /// クエリを全クリアする（Ctrl+U）
    pub fn clear(&mut self) {
        self.query.clear();
        self.cursor_chars = 0;
    }

    fn byte_pos(&self, chars: usize) -> usize {
        self.query
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.query.len())
    }
}

/// 大文字小文字を無視した部分一致。空クエリはすべてに一致する。
pub fn matches_query(text: &str, query: &str) -> bool {
    query.is_empty() || text.to_lowercase().contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(s: &str) -> QueryInput {
        let mut input = QueryInput::new();
        for c in s.chars() {
            input.insert_char(c);
        }
        input
    }

    #[test]
    fn test_insert_char() {
        assert_eq!(input("abc").query(), "abc");
    }

    #[test]
    fn test_insert_char_unicode() {
        let mut q = input("日本");
        q.insert_char('語');
        assert_eq!(q.query(), "日本語");
    }

    #[test]
    fn test_delete_char() {
        let mut q = input("abc");
        q.delete_char();
        assert_eq!(q.query(), "ab");
    }

    #[test]
    fn test_delete_char_at_start() {
        let mut q = QueryInput::new();
        q.delete_char();
        assert!(q.is_empty());
    }

    #[test]
    fn test_delete_char_unicode() {
        let mut q = input("日本語");
        q.delete_char();
        assert_eq!(q.query(), "日本");
    }

    #[test]
    fn test_clear() {
        let mut q = input("query");
        q.clear();
        assert!(q.is_empty());
        q.insert_char('x');
        assert_eq!(q.query(), "x");
    }

    #[test]
    fn test_matches_query_case_insensitive() {
        assert!(matches_query("Fix Bug in parser", "bug"));
        assert!(matches_query("fix bug", "FIX"));
        assert!(!matches_query("Add feature", "bug"));
        assert!(matches_query("anything", ""));
    }
}
