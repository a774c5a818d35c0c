/// A markup directive read from an attribute value such as `title="editor no_copy"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    /// First whitespace-delimited token, lowercased.
    pub keyword: String,
    /// Remaining tokens, lowercased.
    pub args: Vec<String>,
    /// The attribute value as authored.
    pub raw: String,
}

impl Directive {
    /// `None` when the value holds no token at all.
    pub fn parse(value: &str) -> Option<Directive> {
        let lowered = value.to_lowercase();
        let mut tokens = lowered.split_whitespace();
        let keyword = tokens.next()?.to_string();
        Some(Directive {
            keyword,
            args: tokens.map(str::to_string).collect(),
            raw: value.to_string(),
        })
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `name=` among the args, as in `size=(12,80)`.
    pub fn arg_value(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find_map(|a| a.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_is_first_token_lowercased() {
        let d = Directive::parse("  Editor  No_Copy size=(10,40)").expect("directive");
        assert_eq!(d.keyword, "editor");
        assert!(d.has_arg("no_copy"));
        assert_eq!(d.arg_value("size"), Some("(10,40)"));
        assert_eq!(d.raw, "  Editor  No_Copy size=(10,40)");
        assert_eq!(Directive::parse(" \t"), None);
    }
}
