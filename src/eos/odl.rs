//! Object Description Language, the `KEY=VALUE` text of `StructMetadata.N`.
//!
//! ```text
//! GROUP=GridStructure
//!     GROUP=GRID_1
//!         GridName="MOD_Grid"
//!         UpperLeftPointMtrs=(-180000000.000000,90000000.000000)
//!     END_GROUP=GRID_1
//! END_GROUP=GridStructure
//! END
//! ```
//!
//! Parsed into a value tree first; meaning is assigned in [super::structure].

use crate::errors::{Hdf4Error, Result};

/// Deepest nesting of groups and parenthesised arrays accepted.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum OdlValue {
    Scalar(Scalar),
    Array(Vec<OdlValue>),
    Group(OdlGroup),
}

/// `GROUP` or `OBJECT` block with its entries in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OdlGroup {
    pub name: String,
    pub entries: Vec<(String, OdlValue)>,
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Str(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl OdlValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            OdlValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Flattened scalars of an array; a lone scalar is a one element array.
    pub fn scalars(&self) -> Vec<&Scalar> {
        match self {
            OdlValue::Scalar(scalar) => vec![scalar],
            OdlValue::Array(values) => values.iter().flat_map(OdlValue::scalars).collect(),
            OdlValue::Group(_) => vec![],
        }
    }
}

impl OdlGroup {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = lex(text)?;
        let mut parser = Parser { tokens, position: 0 };
        let root = parser.block(String::new(), None, 0)?;
        Ok(root)
    }

    pub fn get(&self, key: &str) -> Option<&OdlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn groups(&self) -> impl Iterator<Item = &OdlGroup> {
        self.entries.iter().filter_map(|(_, value)| match value {
            OdlValue::Group(group) => Some(group),
            _ => None,
        })
    }

    pub fn group(&self, name: &str) -> Option<&OdlGroup> {
        self.groups().find(|group| group.name == name)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_scalar()?.as_str()
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_scalar()?.as_f64()
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_scalar()?.as_i64()
    }

    pub fn f64_array(&self, key: &str) -> Option<Vec<f64>> {
        self.get(key)?
            .scalars()
            .into_iter()
            .map(Scalar::as_f64)
            .collect()
    }

    pub fn str_array(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)?
            .scalars()
            .into_iter()
            .map(|scalar| scalar.as_str().map(str::to_string))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Equals,
    Open,
    Close,
    Comma,
}

fn lex(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() || c == '\0' => {}
            '=' => tokens.push(Token::Equals),
            '(' | '{' => tokens.push(Token::Open),
            ')' | '}' => tokens.push(Token::Close),
            ',' => tokens.push(Token::Comma),
            '"' => {
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => quoted.push(c),
                        None => return Err(Hdf4Error::Metadata("unterminated string".into())),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                loop {
                    match chars.next() {
                        Some('/') if previous == '*' => break,
                        Some(c) => previous = c,
                        None => return Err(Hdf4Error::Metadata("unterminated comment".into())),
                    }
                }
            }
            c => {
                let mut word = String::from(c);
                while let Some(next) =
                    chars.next_if(|next| !next.is_whitespace() && !"=(){},\"".contains(*next))
                {
                    word.push(next);
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect_equals(&mut self, key: &str) -> Result<()> {
        match self.next() {
            Some(Token::Equals) => Ok(()),
            other => Err(Hdf4Error::Metadata(format!(
                "expected '=' after {key}, found {other:?}"
            ))),
        }
    }

    fn name(&mut self, key: &str) -> Result<String> {
        self.expect_equals(key)?;
        match self.next() {
            Some(Token::Word(name) | Token::Quoted(name)) => Ok(name),
            other => Err(Hdf4Error::Metadata(format!("{key} without a name: {other:?}"))),
        }
    }

    fn nested(depth: usize) -> Result<usize> {
        if depth >= MAX_DEPTH {
            return Err(Hdf4Error::Metadata(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        Ok(depth + 1)
    }

    /// Entries up to the matching `END_GROUP`/`END_OBJECT`, or to `END` or the
    /// end of input for the root block.
    fn block(&mut self, name: String, closer: Option<&str>, depth: usize) -> Result<OdlGroup> {
        let mut group = OdlGroup {
            name,
            entries: Vec::new(),
        };
        loop {
            let key = match self.next() {
                None if closer.is_none() => return Ok(group),
                None => {
                    return Err(Hdf4Error::Metadata(format!(
                        "group {} is never closed",
                        group.name
                    )))
                }
                Some(Token::Word(key)) => key,
                Some(other) => {
                    return Err(Hdf4Error::Metadata(format!("unexpected {other:?}")))
                }
            };
            match key.as_str() {
                "END" if closer.is_none() => return Ok(group),
                "GROUP" | "OBJECT" => {
                    let child_name = self.name(&key)?;
                    let end = if key == "GROUP" { "END_GROUP" } else { "END_OBJECT" };
                    let child = self.block(child_name.clone(), Some(end), Self::nested(depth)?)?;
                    group.entries.push((child_name, OdlValue::Group(child)));
                }
                "END_GROUP" | "END_OBJECT" => {
                    if closer != Some(key.as_str()) {
                        return Err(Hdf4Error::Metadata(format!("unbalanced {key}")));
                    }
                    // The name after the closer is optional.
                    if self.tokens.get(self.position) == Some(&Token::Equals) {
                        let end_name = self.name(&key)?;
                        if end_name != group.name {
                            return Err(Hdf4Error::Metadata(format!(
                                "{key}={end_name} closes {}",
                                group.name
                            )));
                        }
                    }
                    return Ok(group);
                }
                _ => {
                    self.expect_equals(&key)?;
                    let value = self.value(depth)?;
                    group.entries.push((key, value));
                }
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<OdlValue> {
        match self.next() {
            Some(Token::Quoted(text)) => Ok(OdlValue::Scalar(Scalar::Str(text))),
            Some(Token::Word(word)) => Ok(OdlValue::Scalar(scalar(word))),
            Some(Token::Open) => {
                let depth = Self::nested(depth)?;
                let mut values = Vec::new();
                if self.tokens.get(self.position) == Some(&Token::Close) {
                    self.position += 1;
                    return Ok(OdlValue::Array(values));
                }
                loop {
                    values.push(self.value(depth)?);
                    match self.next() {
                        Some(Token::Comma) => {}
                        Some(Token::Close) => return Ok(OdlValue::Array(values)),
                        other => {
                            return Err(Hdf4Error::Metadata(format!(
                                "expected ',' or ')' in array, found {other:?}"
                            )))
                        }
                    }
                }
            }
            other => Err(Hdf4Error::Metadata(format!("expected a value, found {other:?}"))),
        }
    }
}

fn scalar(word: String) -> Scalar {
    if let Ok(value) = word.parse::<i64>() {
        Scalar::Int(value)
    } else if let Ok(value) = word.parse::<f64>() {
        Scalar::Float(value)
    } else {
        Scalar::Str(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const GRID: &str = r#"GROUP=SwathStructure
END_GROUP=SwathStructure
GROUP=GridStructure
	GROUP=GRID_1
		GridName="MOD_Grid"
		XDim=1200
		UpperLeftPointMtrs=(-8895604.157333,5559752.598333)
		Projection=GCTP_SNSOID
		ProjParams=(6371007.181000,0,0,
			0,0,0,0,0,0,0,0,0,0)
		GROUP=DataField
			OBJECT=DataField_1
				DataFieldName="sur_refl_b01"
				DimList=("YDim","XDim")
			END_OBJECT=DataField_1
		END_GROUP=DataField
	END_GROUP=GRID_1
END_GROUP=GridStructure
END
"#;

    #[rstest]
    fn nested_groups_and_typed_values() {
        let root = OdlGroup::parse(GRID).unwrap();
        let grid = root.group("GridStructure").unwrap().group("GRID_1").unwrap();
        assert_eq!(grid.str("GridName"), Some("MOD_Grid"));
        assert_eq!(grid.i64("XDim"), Some(1200));
        assert_eq!(grid.str("Projection"), Some("GCTP_SNSOID"));
        assert_eq!(
            grid.f64_array("UpperLeftPointMtrs"),
            Some(vec![-8895604.157333, 5559752.598333])
        );
        assert_eq!(grid.f64_array("ProjParams").map(|p| p.len()), Some(13));
        let field = grid.group("DataField").unwrap().groups().next().unwrap();
        assert_eq!(
            field.str_array("DimList"),
            Some(vec!["YDim".to_string(), "XDim".to_string()])
        );
    }

    #[rstest]
    #[case("GROUP=A\nX=1\n")]
    #[case("GROUP=A\nEND_GROUP=B\n")]
    #[case("X=(1,2\n")]
    #[case("X=\"open\n")]
    #[case("END_GROUP=A\n")]
    #[case("X 1\n")]
    fn malformed_text_is_a_metadata_error(#[case] text: &str) {
        assert!(matches!(OdlGroup::parse(text), Err(Hdf4Error::Metadata(_))));
    }

    #[rstest]
    #[case(format!("X={}1{}\n", "(".repeat(100_000), ")".repeat(100_000)))]
    #[case("GROUP=A\n".repeat(100_000))]
    fn deep_nesting_is_a_metadata_error(#[case] text: String) {
        let err = OdlGroup::parse(&text).unwrap_err();
        assert!(err.to_string().contains("nesting"), "{err}");
    }

    #[rstest]
    fn moderate_nesting_is_accepted() {
        let text = format!("X={}1{}\n", "(".repeat(10), ")".repeat(10));
        let root = OdlGroup::parse(&text).unwrap();
        assert_eq!(root.f64_array("X"), Some(vec![1.]));
    }

    #[rstest]
    fn trailing_nuls_and_comments_are_ignored() {
        let root = OdlGroup::parse("/* header */\nA=\"x\"\nEND\n\0\0").unwrap();
        assert_eq!(root.str("A"), Some("x"));
    }
}
