// src/schema/mod.rs
//
// Canonical column schema for the trip export, plus resolution of the
// export's actual (multilingual, loosely spelled) header row onto it.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::debug;

/// The logical columns the pipeline understands, independent of how the
/// source spreadsheet labels them. Declaration order is resolution order:
/// when two fields' alias sets could claim the same column, the field
/// declared first wins it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Index,
    Days,
    Date,
    Kind,
    From,
    To,
    Place,
    Km,
    Lodging,
    Status,
    Cost,
    Notes,
    Address,
    Link,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Index,
        Field::Days,
        Field::Date,
        Field::Kind,
        Field::From,
        Field::To,
        Field::Place,
        Field::Km,
        Field::Lodging,
        Field::Status,
        Field::Cost,
        Field::Notes,
        Field::Address,
        Field::Link,
    ];

    pub const COUNT: usize = Self::ALL.len();

    fn slot(self) -> usize {
        Self::ALL
            .iter()
            .position(|f| *f == self)
            .expect("every Field variant is listed in ALL")
    }

    /// Recognized header spellings, Italian and English. Matched after
    /// [`normalize_label`] on both sides.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Index => &["n.", "n", "num", "numero", "index", "id", "#"],
            Field::Days => &["giorni", "giorno", "gg", "days", "day", "day count"],
            Field::Date => &["data", "date"],
            Field::Kind => &[
                "tipo",
                "attività",
                "tipo attività",
                "activity",
                "kind",
                "type",
            ],
            Field::From => &["da", "partenza", "origine", "from", "origin"],
            Field::To => &["a", "arrivo", "destinazione", "to", "destination"],
            Field::Place => &["luogo", "città", "località", "posto", "place", "city"],
            Field::Km => &["km", "chilometri", "distanza", "distance", "kms"],
            Field::Lodging => &[
                "alloggio",
                "pernottamento",
                "struttura",
                "hotel",
                "lodging",
                "accommodation",
            ],
            Field::Status => &["stato", "status"],
            Field::Cost => &["costo", "spesa", "prezzo", "cost", "price"],
            Field::Notes => &["note", "commenti", "notes", "comments"],
            Field::Address => &["indirizzo", "address"],
            Field::Link => &["link", "url", "sito", "website"],
        }
    }
}

/// Alias tables with normalization applied once. Aliases that normalize to
/// the empty string (e.g. "#") are unusable as match keys and are skipped.
static NORMALIZED_ALIASES: Lazy<Vec<(Field, Vec<String>)>> = Lazy::new(|| {
    Field::ALL
        .iter()
        .map(|&field| {
            let keys = field
                .aliases()
                .iter()
                .map(|a| normalize_label(a))
                .filter(|k| !k.is_empty())
                .collect();
            (field, keys)
        })
        .collect()
});

/// Normalize a header label (or alias) for comparison: diacritics stripped,
/// lowercased, underscores and hyphens become spaces, any other character
/// that is not alphanumeric, space or '.' becomes a space, whitespace runs
/// collapse to one space, result trimmed.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true; // leading separators trim themselves
    for ch in raw.chars() {
        let ch = fold_diacritic(ch);
        if ch.is_alphanumeric() || ch == '.' {
            for low in ch.to_lowercase() {
                out.push(low);
            }
            last_was_space = false;
        } else if !last_was_space {
            // '_', '-', whitespace and remaining punctuation all separate
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Fold the accented Latin characters that show up in Italian/English
/// spreadsheet headers down to their ASCII base letter. Anything else passes
/// through untouched.
fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        'ý' | 'ÿ' | 'Ý' => 'y',
        other => other,
    }
}

/// Resolved positions of the canonical fields inside one export's header
/// row. Built once per load, immutable afterwards.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    slots: [Option<usize>; Field::COUNT],
}

impl HeaderIndex {
    /// Map a header row onto the canonical fields.
    ///
    /// Each field scans the header left to right and claims the first
    /// still-unclaimed column whose normalized text equals one of its
    /// normalized aliases. Fields with no match are absent, except the date
    /// column: the pipeline cannot build a working set without dates, so a
    /// missing date column fails the whole load.
    pub fn resolve(header: &[String]) -> Result<HeaderIndex> {
        let normalized: Vec<String> = header.iter().map(|h| normalize_label(h)).collect();
        let mut claimed = vec![false; normalized.len()];
        let mut slots = [None; Field::COUNT];

        for (field, keys) in NORMALIZED_ALIASES.iter() {
            let hit = normalized
                .iter()
                .enumerate()
                .find(|(i, cell)| !claimed[*i] && keys.iter().any(|k| k == *cell));
            match hit {
                Some((i, _)) => {
                    claimed[i] = true;
                    slots[field.slot()] = Some(i);
                }
                None => debug!(?field, "no header column matched, field is absent"),
            }
        }

        if slots[Field::Date.slot()].is_none() {
            return Err(anyhow!(
                "export header has no recognizable date column (saw: {})",
                header.join(", ")
            ));
        }

        Ok(HeaderIndex { slots })
    }

    /// Column position of a canonical field, if the header carried it.
    pub fn column(&self, field: Field) -> Option<usize> {
        self.slots[field.slot()]
    }

    /// Extract a field's cell from a raw row. Absent fields and rows too
    /// short to carry the column both read as the empty string.
    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> &'a str {
        self.column(field)
            .and_then(|i| row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalization_folds_case_diacritics_and_punctuation() {
        assert_eq!(normalize_label("DATA"), "data");
        assert_eq!(normalize_label("Città"), "citta");
        assert_eq!(normalize_label("Tipo_Attività"), "tipo attivita");
        assert_eq!(normalize_label("  day -- count  "), "day count");
        assert_eq!(normalize_label("N."), "n.");
        assert_eq!(normalize_label("#"), "");
    }

    #[test]
    fn date_resolves_regardless_of_case_or_language() {
        let upper = HeaderIndex::resolve(&header(&["N.", "DATA", "Tipo"])).unwrap();
        assert_eq!(upper.column(Field::Date), Some(1));

        let lower = HeaderIndex::resolve(&header(&["id", "date", "type"])).unwrap();
        assert_eq!(lower.column(Field::Date), Some(1));
    }

    #[test]
    fn missing_date_column_is_fatal() {
        let err = HeaderIndex::resolve(&header(&["Da", "A", "Km"])).unwrap_err();
        assert!(err.to_string().contains("date column"));
    }

    #[test]
    fn unmatched_fields_degrade_to_absent_and_empty_cells() {
        let idx = HeaderIndex::resolve(&header(&["Data", "Da", "A"])).unwrap();
        assert_eq!(idx.column(Field::Cost), None);

        let row = vec!["5/3/2024".to_string(), "Milano".to_string()];
        assert_eq!(idx.cell(&row, Field::Cost), "");
        // row shorter than the resolved column also reads empty
        assert_eq!(idx.cell(&row, Field::To), "");
        assert_eq!(idx.cell(&row, Field::From), "Milano");
    }

    #[test]
    fn earlier_field_wins_a_contested_column() {
        // "giorno" is an alias of Days, which is declared before Date, so a
        // "Giorno" column belongs to Days even when Date is still unresolved.
        let idx = HeaderIndex::resolve(&header(&["Giorno", "Data", "Giorno"])).unwrap();
        assert_eq!(idx.column(Field::Days), Some(0));
        assert_eq!(idx.column(Field::Date), Some(1));
    }

    #[test]
    fn first_matching_column_is_claimed_left_to_right() {
        let idx = HeaderIndex::resolve(&header(&["Data", "Date"])).unwrap();
        assert_eq!(idx.column(Field::Date), Some(0));
    }
}
