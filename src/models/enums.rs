use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Variants are declared in ascending order, so the derived `Ord` follows
/// declaration order.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Severity {
    Info => "INFO",
    Warning => "WARNING",
    Critical => "CRITICAL",
});

str_enum!(Discipline {
    Architectural => "architectural",
    Electrical => "electrical",
    Mechanical => "mechanical",
    Plumbing => "plumbing",
    Structural => "structural",
    Elevator => "elevator",
    Other => "other",
});

str_enum!(StageName {
    Ingest => "INGEST",
    Extract => "EXTRACT",
    Filter => "FILTER",
    CrossReference => "CROSS_REFERENCE",
    Classify => "CLASSIFY",
    CostEstimate => "COST_ESTIMATE",
});

str_enum!(DocumentState {
    Ingested => "INGESTED",
    Extracted => "EXTRACTED",
    Filtered => "FILTERED",
    CrossReferenced => "CROSS_REFERENCED",
    Classified => "CLASSIFIED",
    Estimated => "ESTIMATED",
    Drafted => "DRAFTED",
});

str_enum!(FindingKind {
    UncoordinatedNewScope => "UNCOORDINATED_NEW_SCOPE",
    AmbiguousBaseline => "AMBIGUOUS_BASELINE",
});

/// Sheets whose title block names no known discipline.
impl Default for Discipline {
    fn default() -> Self {
        Discipline::Other
    }
}

impl StageName {
    /// Pipeline order. Progress events report `index() + 1` of `ALL.len()`.
    pub const ALL: [StageName; 6] = [
        StageName::Ingest,
        StageName::Extract,
        StageName::Filter,
        StageName::CrossReference,
        StageName::Classify,
        StageName::CostEstimate,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Ingest => 0,
            Self::Extract => 1,
            Self::Filter => 2,
            Self::CrossReference => 3,
            Self::Classify => 4,
            Self::CostEstimate => 5,
        }
    }
}

impl DocumentState {
    /// The state that follows this one, or `None` once drafted.
    pub fn next(&self) -> Option<DocumentState> {
        match self {
            Self::Ingested => Some(Self::Extracted),
            Self::Extracted => Some(Self::Filtered),
            Self::Filtered => Some(Self::CrossReferenced),
            Self::CrossReferenced => Some(Self::Classified),
            Self::Classified => Some(Self::Estimated),
            Self::Estimated => Some(Self::Drafted),
            Self::Drafted => None,
        }
    }

    /// Checked transition: `Some(to)` only when `to` directly follows `self`.
    pub fn advance(&self, to: DocumentState) -> Option<DocumentState> {
        (self.next() == Some(to)).then_some(to)
    }

    /// State a document reaches once `stage` has completed.
    pub fn after(stage: StageName) -> DocumentState {
        match stage {
            StageName::Ingest => Self::Ingested,
            StageName::Extract => Self::Extracted,
            StageName::Filter => Self::Filtered,
            StageName::CrossReference => Self::CrossReferenced,
            StageName::Classify => Self::Classified,
            StageName::CostEstimate => Self::Estimated,
        }
    }
}
