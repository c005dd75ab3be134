use crate::error::TransitError;
use crate::types::{Passenger, Trip, TripStatus};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// One page of Helvetica text fits this many lines at the leading used below.
const MAX_LINES: usize = 52;

/// Render the daily report for one passenger as a single-page PDF.
pub fn daily_report_pdf(
    passenger: &Passenger,
    period: &str,
    trips: &[Trip],
) -> Result<Vec<u8>, TransitError> {
    let mut lines = vec![
        "REPORTE DIARIO".to_string(),
        String::new(),
        format!("Pasajero: {}", passenger.name),
        format!("Cedula: {}", passenger.cedula),
        format!("Periodo: {period}"),
        String::new(),
    ];

    if trips.is_empty() {
        lines.push("No hay registros de viajes para este periodo.".to_string());
    } else {
        lines.push(format!(
            "{:<8} {:<24} {:<24} {}",
            "HORA", "ORIGEN", "DESTINO", "ESTADO"
        ));
        for trip in trips {
            let status = match trip.status {
                TripStatus::Started => "EN CURSO",
                TripStatus::Finished => "COMPLETADO",
            };
            lines.push(format!(
                "{:<8} {:<24} {:<24} {}",
                trip.started_at.format("%H:%M"),
                truncate(trip.origin.as_deref().unwrap_or("-"), 22),
                truncate(trip.destination.as_deref().unwrap_or("-"), 22),
                status
            ));
        }
    }

    if lines.len() > MAX_LINES {
        lines.truncate(MAX_LINES - 1);
        lines.push("...".to_string());
    }

    render_lines(&lines)
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn render_lines(lines: &[String]) -> Result<Vec<u8>, TransitError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 11.into()]),
        Operation::new("Td", vec![40.into(), 800.into()]),
        Operation::new("TL", vec![14.into()]),
    ];
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.as_str())],
        ));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| TransitError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| TransitError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passenger() -> Passenger {
        Passenger::new(
            "Ana".to_string(),
            "100".to_string(),
            "TI".to_string(),
            None,
        )
    }

    #[test]
    fn output_is_a_pdf_document() {
        let bytes = daily_report_pdf(&passenger(), "2024-03-01", &[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn trip_rows_do_not_break_rendering() {
        let p = passenger();
        let mut trip = Trip::start(
            p.id.clone(),
            "c-1".to_string(),
            Some("Base Principal de Operaciones Norte".to_string()),
            Some("Planta".to_string()),
        );
        trip.status = TripStatus::Finished;
        let bytes = daily_report_pdf(&p, "2024-03-01", &[trip]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
