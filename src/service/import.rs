use crate::error::TransitError;
use crate::service::registry::Registry;
use crate::types::Passenger;

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// Accepted header spellings for each imported column. Matching is exact
/// (the alias tables carry the observed spellings) with a case-insensitive
/// fallback, so unexpected headers fail loudly instead of mapping to empty
/// fields.
pub const NAME_ALIASES: [&str; 6] = [
    "Nombres y Apellidos",
    "Nombre",
    "nombre",
    "NOMBRE",
    "Name",
    "name",
];
pub const CEDULA_ALIASES: [&str; 5] = ["Cedula", "cedula", "CEDULA", "ID", "id"];
pub const GERENCIA_ALIASES: [&str; 5] = [
    "Gerencia",
    "gerencia",
    "GERENCIA",
    "Department",
    "department",
];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped_missing: usize,
    pub skipped_duplicate: usize,
}

/// Import passengers from CSV text. Rows missing a name or cedula are
/// skipped; duplicate cedulas (against the stored set or within the file)
/// are skipped, so importing the same file twice yields zero new records.
pub async fn import_passengers_csv(
    registry: &Registry,
    text: &str,
) -> Result<ImportSummary, TransitError> {
    let rows = parse_csv(text);
    let Some((header, data)) = rows.split_first() else {
        return Err(TransitError::Validation(
            "file contains no data".to_string(),
        ));
    };
    if data.is_empty() {
        return Err(TransitError::Validation(
            "file contains no data rows".to_string(),
        ));
    }
    let columns = resolve_columns(header)?;

    let existing = registry.list_passengers().await?;
    let mut seen: HashSet<String> = existing.iter().map(|p| p.cedula.clone()).collect();

    let mut summary = ImportSummary::default();
    let mut new_passengers = Vec::new();
    for row in data {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let name = field(Some(columns.name));
        let cedula = field(Some(columns.cedula));
        if name.is_empty() || cedula.is_empty() {
            summary.skipped_missing += 1;
            continue;
        }
        if seen.contains(&cedula) {
            summary.skipped_duplicate += 1;
            continue;
        }
        let gerencia = field(columns.gerencia);

        seen.insert(cedula.clone());
        new_passengers.push(Passenger::new(name, cedula, gerencia, None));
    }

    summary.imported = registry.append_passengers(new_passengers).await?;
    info!(
        imported = summary.imported,
        skipped_missing = summary.skipped_missing,
        skipped_duplicate = summary.skipped_duplicate,
        "passenger import finished"
    );
    Ok(summary)
}

struct ColumnIndexes {
    name: usize,
    cedula: usize,
    gerencia: Option<usize>,
}

fn resolve_columns(header: &[String]) -> Result<ColumnIndexes, TransitError> {
    let find = |aliases: &[&str]| {
        header
            .iter()
            .position(|h| aliases.contains(&h.trim()))
            .or_else(|| {
                header
                    .iter()
                    .position(|h| aliases.iter().any(|a| a.eq_ignore_ascii_case(h.trim())))
            })
    };

    let name = find(&NAME_ALIASES);
    let cedula = find(&CEDULA_ALIASES);
    match (name, cedula) {
        (Some(name), Some(cedula)) => Ok(ColumnIndexes {
            name,
            cedula,
            gerencia: find(&GERENCIA_ALIASES),
        }),
        _ => Err(TransitError::Validation(
            "file must contain columns for cedula and name".to_string(),
        )),
    }
}

/// Minimal CSV parser: quoted fields, doubled-quote escapes, CRLF, and
/// `,`/`;` delimiters (picked by frequency in the header line).
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let delimiter = detect_delimiter(text);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if row.iter().any(|f| !f.is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        if row.iter().any(|f| !f.is_empty()) {
            rows.push(row);
        }
    }
    rows
}

fn detect_delimiter(text: &str) -> char {
    let first_line = text.lines().next().unwrap_or_default();
    let commas = first_line.matches(',').count();
    let semicolons = first_line.matches(';').count();
    if semicolons > commas { ';' } else { ',' }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionStorage, KvStore, StorageHandle};
    use tempfile::tempdir;

    async fn test_registry(dir: &std::path::Path) -> Registry {
        let kv = KvStore::open(dir.join("kv"), 1024 * 1024).unwrap();
        let url = format!("sqlite:{}", dir.join("store.sqlite").display());
        let db = CollectionStorage::connect(&url).await.unwrap();
        Registry::new(StorageHandle::spawn(kv, db).await.unwrap())
    }

    #[test]
    fn parses_quoted_fields_and_semicolons() {
        let rows = parse_csv("Nombre;Cedula\n\"Pérez; Ana\";100\nLuis;200\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["Pérez; Ana".to_string(), "100".to_string()]);
    }

    #[test]
    fn doubled_quotes_unescape() {
        let rows = parse_csv("a,b\n\"say \"\"hi\"\"\",x\n");
        assert_eq!(rows[1][0], "say \"hi\"");
    }

    #[test]
    fn header_aliases_resolve_case_insensitively() {
        let header: Vec<String> = ["NAME", "Id", "Department"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cols = resolve_columns(&header).unwrap();
        assert_eq!(cols.name, 0);
        assert_eq!(cols.cedula, 1);
        assert_eq!(cols.gerencia, Some(2));
    }

    #[test]
    fn unknown_headers_are_a_validation_error() {
        let header: Vec<String> = ["foo", "bar"].iter().map(|s| s.to_string()).collect();
        assert!(resolve_columns(&header).is_err());
    }

    #[tokio::test]
    async fn reimporting_the_same_file_adds_nothing() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;
        let csv = "Nombre,Cedula,Gerencia\nAna,100,TI\nLuis,200,RRHH\n,300,SinNombre\n";

        let first = import_passengers_csv(&registry, csv).await.unwrap();
        assert_eq!(first.imported, 2);
        assert_eq!(first.skipped_missing, 1);

        let second = import_passengers_csv(&registry, csv).await.unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped_duplicate, 2);

        assert_eq!(registry.list_passengers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicates_within_one_file_are_skipped() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;
        let csv = "Nombre,Cedula\nAna,100\nAna Otra Vez,100\n";

        let summary = import_passengers_csv(&registry, csv).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped_duplicate, 1);
    }
}
