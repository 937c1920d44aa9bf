//! Dataset identifiers: a bare container path or
//! `PREFIX:KIND:target[:selector...]`.
//!
//! Tokens are separated by `:` outside of double quotes; quoted tokens are
//! taken verbatim. An unquoted single letter followed by a token starting
//! with `\` or `/` is rejoined as a drive letter path.

use std::{fmt, str::FromStr};

use crate::errors::{Hdf4Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// Scientific dataset by catalogue index.
    Sds,
    /// General raster image by catalogue index.
    Gr,
    /// Grid or swath field by structure and field name.
    Eos,
}

impl Prefix {
    pub const ALL: [Prefix; 3] = [Prefix::Sds, Prefix::Gr, Prefix::Eos];

    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::Sds => "HDF4_SDS",
            Prefix::Gr => "HDF4_GR",
            Prefix::Eos => "HDF4_EOS",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prefix| prefix.as_str() == token)
    }
}

/// Product kind token. Only the EOS kinds change how a selector resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Unknown,
    EosGrid,
    EosSwath,
    EosSwathGeol,
    GdalHdf4,
    SeawifsL1a,
    SeawifsL2,
    SeawifsL3,
    ModisL1b,
    ModisL2,
    ModisL3,
    ModisUnk,
    HyperionL1,
    AsterL1a,
    AsterL1b,
    AsterL2,
    Ast14Dem,
}

impl Kind {
    pub const ALL: [Kind; 17] = [
        Kind::Unknown,
        Kind::EosGrid,
        Kind::EosSwath,
        Kind::EosSwathGeol,
        Kind::GdalHdf4,
        Kind::SeawifsL1a,
        Kind::SeawifsL2,
        Kind::SeawifsL3,
        Kind::ModisL1b,
        Kind::ModisL2,
        Kind::ModisL3,
        Kind::ModisUnk,
        Kind::HyperionL1,
        Kind::AsterL1a,
        Kind::AsterL1b,
        Kind::AsterL2,
        Kind::Ast14Dem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Unknown => "UNKNOWN",
            Kind::EosGrid => "EOS_GRID",
            Kind::EosSwath => "EOS_SWATH",
            Kind::EosSwathGeol => "EOS_SWATH_GEOL",
            Kind::GdalHdf4 => "GDAL_HDF4",
            Kind::SeawifsL1a => "SEAWIFS_L1A",
            Kind::SeawifsL2 => "SEAWIFS_L2",
            Kind::SeawifsL3 => "SEAWIFS_L3",
            Kind::ModisL1b => "MODIS_L1B",
            Kind::ModisL2 => "MODIS_L2",
            Kind::ModisL3 => "MODIS_L3",
            Kind::ModisUnk => "MODIS_UNK",
            Kind::HyperionL1 => "HYPERION_L1",
            Kind::AsterL1a => "ASTER_L1A",
            Kind::AsterL1b => "ASTER_L1B",
            Kind::AsterL2 => "ASTER_L2",
            Kind::Ast14Dem => "AST14DEM",
        }
    }

    pub fn is_eos(self) -> bool {
        matches!(self, Kind::EosGrid | Kind::EosSwath | Kind::EosSwathGeol)
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == token)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Object index followed by one index per leading dimension.
    Indices(Vec<usize>),
    Field {
        structure: String,
        field: String,
        planes: Vec<usize>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subdataset {
    pub prefix: Prefix,
    pub kind: Kind,
    pub path: String,
    pub selector: Option<Selector>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    /// Whole container; the object is picked by the default selection policy.
    Path(String),
    Subdataset(Subdataset),
}

impl Identifier {
    pub fn path(&self) -> &str {
        match self {
            Identifier::Path(path) => path,
            Identifier::Subdataset(subdataset) => &subdataset.path,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let error = |reason: &str| Hdf4Error::identifier(text, reason);
        let tokens = tokenize(text).map_err(|reason| error(reason))?;
        let Some(prefix) = tokens
            .first()
            .filter(|token| !token.quoted && tokens.len() > 1)
            .and_then(|token| Prefix::from_token(&token.text))
        else {
            return Ok(Identifier::Path(text.to_string()));
        };

        let kind = tokens
            .get(1)
            .and_then(|token| Kind::from_token(&token.text))
            .ok_or_else(|| error("unrecognized kind"))?;
        if kind.is_eos() != (prefix == Prefix::Eos) {
            return Err(error("kind does not match prefix"));
        }

        let mut rest = tokens[2..].iter().peekable();
        let target = rest.next().ok_or_else(|| error("missing container path"))?;
        let mut path = target.text.clone();
        if !target.quoted && is_drive_letter(&path) {
            if let Some(next) = rest.next_if(|next| {
                !next.quoted && (next.text.starts_with('\\') || next.text.starts_with('/'))
            }) {
                path = format!("{path}:{}", next.text);
            }
        }
        if path.is_empty() {
            return Err(error("empty container path"));
        }

        let parts: Vec<&Token> = rest.collect();
        let selector = match (prefix, parts.as_slice()) {
            (_, []) => None,
            (Prefix::Eos, [_]) => return Err(error("expected structure and field names")),
            (Prefix::Eos, [structure, field, planes @ ..]) => Some(Selector::Field {
                structure: structure.text.clone(),
                field: field.text.clone(),
                planes: parse_indices(planes).ok_or_else(|| error("plane index is not an integer"))?,
            }),
            (Prefix::Sds | Prefix::Gr, indices) => Some(Selector::Indices(
                parse_indices(indices).ok_or_else(|| error("selector is not an integer"))?,
            )),
        };

        Ok(Identifier::Subdataset(Subdataset {
            prefix,
            kind,
            path,
            selector,
        }))
    }
}

impl FromStr for Identifier {
    type Err = Hdf4Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

fn quote_if_needed(name: &str) -> String {
    if name.contains(':') || name.starts_with('"') {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

impl fmt::Display for Subdataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:\"{}\"", self.prefix.as_str(), self.kind.as_str(), self.path)?;
        match &self.selector {
            None => Ok(()),
            Some(Selector::Indices(indices)) => {
                indices.iter().try_for_each(|index| write!(f, ":{index}"))
            }
            Some(Selector::Field {
                structure,
                field,
                planes,
            }) => {
                write!(f, ":{}:{}", quote_if_needed(structure), quote_if_needed(field))?;
                planes.iter().try_for_each(|index| write!(f, ":{index}"))
            }
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Path(path) => f.write_str(path),
            Identifier::Subdataset(subdataset) => subdataset.fmt(f),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, &'static str> {
    let mut tokens = Vec::new();
    let mut chars = text.chars();
    loop {
        let mut token = Token {
            text: String::new(),
            quoted: false,
        };
        let rest = chars.as_str();
        if rest.starts_with('"') {
            chars.next();
            token.quoted = true;
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => token.text.push(c),
                    None => return Err("unterminated quote"),
                }
            }
        }
        let mut last = true;
        for c in chars.by_ref() {
            if c == ':' {
                last = false;
                break;
            }
            if token.quoted {
                return Err("quoted token followed by text");
            }
            token.text.push(c);
        }
        tokens.push(token);
        if last {
            return Ok(tokens);
        }
    }
}

fn is_drive_letter(token: &str) -> bool {
    token.len() == 1 && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn parse_indices(tokens: &[&Token]) -> Option<Vec<usize>> {
    tokens
        .iter()
        .map(|token| token.text.trim().parse::<usize>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn subdataset(text: &str) -> Subdataset {
        match Identifier::parse(text).unwrap() {
            Identifier::Subdataset(subdataset) => subdataset,
            other => panic!("{other:?} is not a subdataset"),
        }
    }

    #[rstest]
    fn quoted_and_bare_names_resolve_alike() {
        let quoted = subdataset(r#"HDF4_EOS:EOS_GRID:"data/a.hdf":"MODIS_NACP_EVI":"MODIS_EVI""#);
        let bare = subdataset("HDF4_EOS:EOS_GRID:data/a.hdf:MODIS_NACP_EVI:MODIS_EVI");
        assert_eq!(quoted, bare);
        assert_eq!(
            quoted.selector,
            Some(Selector::Field {
                structure: "MODIS_NACP_EVI".into(),
                field: "MODIS_EVI".into(),
                planes: vec![]
            })
        );
    }

    #[rstest]
    fn quoted_path_keeps_colons_and_spaces() {
        let parsed = subdataset(r#"HDF4_EOS:EOS_GRID:"a:b.hdf":"Group Name":"Field: Name""#);
        assert_eq!(parsed.path, "a:b.hdf");
        assert!(matches!(
            parsed.selector,
            Some(Selector::Field { ref structure, ref field, .. })
                if structure == "Group Name" && field == "Field: Name"
        ));
    }

    #[rstest]
    fn bare_path_with_colon_does_not_parse_as_intended() {
        let parsed = Identifier::parse("HDF4_EOS:EOS_GRID:a:b.hdf:Group:Field");
        assert!(parsed.is_err() || parsed.unwrap().path() != "a:b.hdf");
    }

    #[rstest]
    fn bare_names_may_contain_spaces() {
        let parsed = subdataset("HDF4_EOS:EOS_GRID:x.hdf:MODIS_Grid_16DAY:250m 16 days NDVI");
        assert!(matches!(
            parsed.selector,
            Some(Selector::Field { ref field, .. }) if field == "250m 16 days NDVI"
        ));
    }

    #[rstest]
    #[case(r"HDF4_SDS:UNKNOWN:C:\data\file.hdf:3", r"C:\data\file.hdf")]
    #[case("HDF4_SDS:UNKNOWN:d:/data/file.hdf:3", "d:/data/file.hdf")]
    #[case(r#"HDF4_SDS:UNKNOWN:"C:\data\file.hdf":3"#, r"C:\data\file.hdf")]
    fn drive_letters_stay_in_the_path(#[case] text: &str, #[case] path: &str) {
        let parsed = subdataset(text);
        assert_eq!(parsed.path, path);
        assert_eq!(parsed.selector, Some(Selector::Indices(vec![3])));
    }

    #[rstest]
    #[case("HDF4_SDS:BOGUS:\"f.hdf\":1")]
    #[case("HDF4_SDS:UNKNOWN:\"f.hdf\":one")]
    #[case("HDF4_SDS:EOS_GRID:\"f.hdf\":1")]
    #[case("HDF4_EOS:EOS_GRID:\"f.hdf\":Grid")]
    #[case("HDF4_SDS:UNKNOWN:\"f.hdf")]
    #[case("HDF4_SDS:UNKNOWN")]
    fn malformed_identifiers_are_rejected(#[case] text: &str) {
        match Identifier::parse(text) {
            Err(Hdf4Error::Identifier { identifier, .. }) => assert_eq!(identifier, text),
            other => panic!("{text} parsed as {other:?}"),
        }
    }

    #[rstest]
    #[case("data/file.hdf")]
    #[case(r"C:\data\file.hdf")]
    #[case("/tmp/with space.hdf")]
    fn plain_paths_are_whole_container_opens(#[case] text: &str) {
        assert_eq!(Identifier::parse(text).unwrap(), Identifier::Path(text.into()));
    }

    #[rstest]
    #[case(r#"HDF4_SDS:UNKNOWN:"tmp/x.hdf":13"#)]
    #[case(r#"HDF4_SDS:SEAWIFS_L2:"tmp/x.hdf":2:0"#)]
    #[case(r#"HDF4_GR:UNKNOWN:"tmp/x.hdf":0"#)]
    #[case(r#"HDF4_EOS:EOS_SWATH:"tmp/x.hdf":Swath1:"a:b":1"#)]
    fn canonical_form_is_stable(#[case] text: &str) {
        let identifier: Identifier = text.parse().unwrap();
        assert_eq!(identifier.to_string(), text);
    }
}
