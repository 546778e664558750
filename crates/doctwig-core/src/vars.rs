//! Variable extraction from code tokens
//!
//! [`VarExtractor`] scans the text of `{{ }}` and `{% %}` tokens for the
//! identifiers a template reads, so a caller can find out which data a
//! template needs before rendering it. Comments are skipped. The result is
//! a [`VarSet`], ordered alphabetically without regard to case.
//!
//! ```
//! use doctwig_core::VarExtractor;
//!
//! let mut extractor = VarExtractor::new(None);
//! extractor.parse("{{ user.name|upper }}");
//! extractor.parse("{% if total > limit(3) %}");
//!
//! let vars: Vec<&str> = extractor.vars().iter().collect();
//! assert_eq!(vars, vec!["total", "user.name"]);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

/// Literals and keywords that are never variables
const RESERVED: &[&str] = &[
    "true", "false", "in", "as", "null", "is", "not", "with", "and", "or",
];

/// Names bound by the template itself
const DISALLOWED_PREFIXES: &[&str] = &["macros."];

const DIVIDERS: &[char] = &[
    ',', '=', '*', '/', '%', '+', '-', '~', '<', '>', '!', '|', '?', ':', '(', ')', '[', ']', '{',
    '}',
];

/// Variable name compared without regard to case
#[derive(Debug, Clone)]
struct VarName(String);

impl VarName {
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl Ord for VarName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl PartialOrd for VarName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VarName {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VarName {}

/// Distinct variable names in case-insensitive alphabetical order
///
/// The first spelling seen of a name is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarSet {
    names: BTreeSet<VarName>,
}

impl VarSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name; returns false when it was already present in any case
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(VarName(name.into()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&VarName(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(|n| n.0.as_str())
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: VarSet) {
        for name in other.names {
            self.names.insert(name);
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.names.into_iter().map(|n| n.0).collect()
    }
}

impl Serialize for VarSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<S: Into<String>> FromIterator<S> for VarSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = VarSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Accumulates variables over any number of code tokens
#[derive(Debug, Clone, Default)]
pub struct VarExtractor {
    vars: VarSet,
    prefix: Option<String>,
}

impl VarExtractor {
    /// Extractor keeping only names that start with `prefix`; an empty
    /// prefix keeps everything
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            vars: VarSet::new(),
            prefix: prefix.filter(|p| !p.is_empty()).map(String::from),
        }
    }

    pub fn vars(&self) -> &VarSet {
        &self.vars
    }

    pub fn into_vars(self) -> VarSet {
        self.vars
    }

    /// Scan one code token
    pub fn parse(&mut self, code: &str) {
        let Some(body) = expression_body(code) else {
            return;
        };
        let chars: Vec<char> = body.chars().collect();

        let mut quote: Option<char> = None;
        let mut run: Option<usize> = None;
        // A run cut off by whitespace; the next character decides its fate
        let mut spaced: Option<String> = None;
        let mut filtered = false;
        let mut ternary = false;

        for (i, &c) in chars.iter().enumerate() {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                continue;
            }
            if c.is_whitespace() {
                if let Some(start) = run.take() {
                    spaced = Some(chars[start..i].iter().collect());
                }
                continue;
            }
            if !DIVIDERS.contains(&c) {
                if let Some(name) = spaced.take() {
                    if !filtered {
                        self.record(&name);
                    }
                    filtered = false;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                    run = None;
                } else if c.is_alphabetic() || c == '_' {
                    run.get_or_insert(i);
                }
                // Digits and dots extend a run in progress
                continue;
            }

            let ended = run
                .take()
                .map(|start| chars[start..i].iter().collect::<String>())
                .or_else(|| spaced.take());
            match c {
                // A call, not a variable
                '(' => {}
                // An object key
                ':' if !ternary => {}
                _ => {
                    if let Some(name) = ended {
                        if !filtered {
                            self.record(&name);
                        }
                    }
                    if c == ':' {
                        ternary = false;
                    }
                }
            }
            if c == '?' {
                ternary = true;
            }
            filtered = c == '|';
        }
    }

    fn record(&mut self, run: &str) {
        for word in run.split_whitespace() {
            let starts_identifier = word
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
            if !starts_identifier
                || RESERVED.contains(&word)
                || DISALLOWED_PREFIXES.iter().any(|p| word.starts_with(p))
            {
                continue;
            }
            if let Some(prefix) = &self.prefix {
                if !word.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            self.vars.insert(word);
        }
    }
}

/// Part of a code token that holds expressions
///
/// Output tokens are scanned whole; block tokens after their keyword;
/// comments and anything else not at all.
fn expression_body(code: &str) -> Option<&str> {
    if let Some(rest) = code.strip_prefix("{{") {
        return Some(rest);
    }
    let rest = code.strip_prefix("{%")?;
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '~');
    let keyword_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (keyword_len > 0).then(|| &rest[keyword_len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(tokens: &[&str]) -> Vec<String> {
        let mut extractor = VarExtractor::new(None);
        for token in tokens {
            extractor.parse(token);
        }
        extractor.into_vars().into_vec()
    }

    #[test]
    fn test_alphabetical_not_discovery_order() {
        assert_eq!(extract(&["{{b}}", "{{a}}"]), vec!["a", "b"]);
    }

    #[test]
    fn test_case_insensitive_dedup_keeps_first() {
        assert_eq!(extract(&["{{A}}", "{{a}}"]), vec!["A"]);
    }

    #[test]
    fn test_calls_are_skipped() {
        assert_eq!(extract(&["{{helper(x)}}"]), vec!["x"]);
        assert_eq!(extract(&["{{ helper (x) }}"]), vec!["x"]);
    }

    #[test]
    fn test_call_keeps_earlier_operands() {
        assert_eq!(extract(&["{% if a and helper(b) %}"]), vec!["a", "b"]);
        assert_eq!(extract(&["{% for i in range(1, n) %}"]), vec!["i", "n"]);
        assert_eq!(
            extract(&["{% if user.active and date(due) %}"]),
            vec!["due", "user.active"]
        );
    }

    #[test]
    fn test_filters_are_skipped() {
        assert_eq!(extract(&["{{x|format}}"]), vec!["x"]);
        assert_eq!(extract(&["{{ a|upper ~ b|lower }}"]), vec!["a", "b"]);
        assert_eq!(
            extract(&["{{ total*1000|number_format(2, \".\", \"'\") }}"]),
            vec!["total"]
        );
    }

    #[test]
    fn test_strings_are_skipped() {
        assert_eq!(extract(&["{{ \"a b\" ~ name ~ 'c' }}"]), vec!["name"]);
    }

    #[test]
    fn test_ternary_and_object_keys() {
        assert_eq!(extract(&["{{ ok ? yes : no }}"]), vec!["no", "ok", "yes"]);
        assert_eq!(extract(&["{% set cfg = {key: value} %}"]), vec!["cfg", "value"]);
    }

    #[test]
    fn test_reserved_and_macro_names() {
        assert_eq!(extract(&["{% if a is not null and b %}"]), vec!["a", "b"]);
        assert!(extract(&["{{ macros.row(1) }}"]).is_empty());
        assert!(extract(&["{{ macros.title }}"]).is_empty());
    }

    #[test]
    fn test_comments_and_bare_keywords() {
        assert!(extract(&["{# {{ hidden }} #}"]).is_empty());
        assert!(extract(&["{% else %}", "{% endif %}"]).is_empty());
    }

    #[test]
    fn test_prefix_filter() {
        let mut extractor = VarExtractor::new(Some("input."));
        extractor.parse("{{ input.Name }}");
        extractor.parse("{{ input.Age }}");
        extractor.parse("{{ other.Val }}");
        let vars = extractor.into_vars().into_vec();
        assert_eq!(vars, vec!["input.Age", "input.Name"]);

        let mut everything = VarExtractor::new(Some(""));
        everything.parse("{{ other.Val }}");
        assert_eq!(everything.vars().len(), 1);
    }

    #[test]
    fn test_whitespace_control_markers() {
        assert_eq!(extract(&["{%- for item in list -%}"]), vec!["item", "list"]);
    }

    #[test]
    fn test_var_set_serializes_as_list() {
        let set: VarSet = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_full_template() {
        let tokens = [
            "{% set easy=\"this is how easy it is to set variables\" %}",
            "{{ firstname }}",
            "{% macro person (firstname, lastname, age) %}",
            "{%if (age<25) %}",
            "{%elseif (age>25 and age<32) %}",
            "{% endmacro %}",
            "{% block inlineBlock %}",
            "{% block paragraphBlock %}",
            "{% for item in [1,2,3] %}",
            "{{loop.index}}",
            "{{ loop.index0 }}",
            "{% set total=item+total %}",
            "{{total*1000|number_format(2, \".\", \"'\")}}",
            "{%if (condition)%}",
            "{% elseif (condition2) %}",
            "{{default(undefinedVariable,'World')}}",
            "{% set input={Var1:10,Var2:25,Var3:1000,Var4:\"Text Value\"} %}",
            "{{input.Var1*input.Var2}}",
            "{{input.Var3/input.Var2}}",
            "{{(input.Var1>8)?\"Var is higher than 8\":\"Var is lower than 8\"}}",
            "{{input.Var4}}",
            "{{ input.ImageFile1 }}",
            "{% set iB={\"printed\":false,\"Name\":\"inline block\"} %}",
            "{{ iB.Name }}",
            "{{ (iB.printed)?\"again \":\"\" }}",
            "{{ (iB.printed)?myVarInsideInlineCond:SecondVarInsideInlineCond }}",
        ];
        assert_eq!(
            extract(&tokens),
            vec![
                "age",
                "condition",
                "condition2",
                "easy",
                "firstname",
                "iB",
                "iB.Name",
                "iB.printed",
                "inlineBlock",
                "input",
                "input.ImageFile1",
                "input.Var1",
                "input.Var2",
                "input.Var3",
                "input.Var4",
                "item",
                "lastname",
                "loop.index",
                "loop.index0",
                "myVarInsideInlineCond",
                "paragraphBlock",
                "SecondVarInsideInlineCond",
                "total",
                "undefinedVariable",
            ]
        );
    }

    #[test]
    fn test_expression_body() {
        assert_eq!(expression_body("{{ x }}"), Some(" x }}"));
        assert_eq!(expression_body("{% if x %}"), Some(" x %}"));
        assert_eq!(expression_body("{%if(x)%}"), Some("(x)%}"));
        assert_eq!(expression_body("{# x #}"), None);
        assert_eq!(expression_body("{% %}"), None);
    }
}
