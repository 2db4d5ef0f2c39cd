use chrono::FixedOffset;
use dairy_core::domain::account::{Ack, UserProfile};
use dairy_core::domain::records::{Animal, HealthKind, HealthRecord};
use dairy_core::ingest::DairyApiClient;
use dairy_core::report::{format_amount, Table};
use dairy_core::time::farm_calendar::parse_record_date;

pub fn print_table(table: &Table) {
    println!("{}", table.render());
}

/// Prints the backend's message when it sent one.
pub fn print_ack(ack: &Ack, fallback: &str) {
    match ack.message.as_deref().map(str::trim) {
        Some(message) if !message.is_empty() => println!("{message}"),
        _ => println!("{fallback}"),
    }
}

pub fn print_profile(profile: &UserProfile) {
    let or_dash = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).unwrap_or("-").to_string();

    println!("{}", profile.display_name());
    println!("  Email:      {}", profile.email);
    println!("  Farm:       {}", or_dash(profile.farm_name.as_deref()));
    println!("  Address:    {}", or_dash(profile.address.as_deref()));
    let size = profile
        .farm_size
        .as_ref()
        .map(|s| format!("{} {}", s.value, s.unit))
        .unwrap_or_else(|| "-".to_string());
    println!("  Farm size:  {size}");
    let cattle = profile
        .number_of_cattle
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("  Cattle:     {cattle}");
}

pub fn animals_table(animals: &[Animal], api: &DairyApiClient) -> Table {
    let mut table = Table::new(["ID", "Tag ID", "Breed", "Image"])
        .titled("Animals")
        .when_empty("No animals found.");
    for animal in animals {
        table.push(vec![
            animal.id.clone(),
            animal.tag_id.clone(),
            animal.breed.clone(),
            animal
                .image
                .as_deref()
                .filter(|i| !i.trim().is_empty())
                .map(|i| api.image_url(i))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

fn field_heading(field: &str) -> &str {
    match field {
        "date" => "Date",
        "breedingDate" => "Breeding Date",
        "typeOfTest" => "Type of Test",
        "results" => "Results",
        "followUpActions" => "Follow-Up Actions",
        "medicationName" => "Medication Name",
        "dosage" => "Dosage",
        "method" => "Method",
        "administeredBy" => "Administered By",
        "notes" => "Notes",
        "pregnancyCheckDate" => "Pregnancy Check Date",
        "result" => "Result",
        "calvingDate" => "Calving Date",
        "postPartumHealthStatus" => "Post-Partum Health Status",
        "vaccine" => "Vaccine",
        "nextDueDate" => "Next Due Date",
        "weight" => "Weight",
        "bodyConditionScore" => "Body Condition Score",
        "vetNotes" => "Vet Notes",
        other => other,
    }
}

/// Date-valued fields are shown as plain dates; everything else verbatim.
fn health_cell(record: &HealthRecord, field: &str, offset: FixedOffset) -> String {
    let text = record.field_text(field);
    if text.trim().is_empty() {
        return "-".to_string();
    }
    if field.ends_with("Date") || field == "date" || field == "updatedAt" {
        if let Some(date) = parse_record_date(&text, offset) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    text
}

pub fn health_table(kind: HealthKind, records: &[HealthRecord], offset: FixedOffset) -> Table {
    let mut headers = vec!["ID", "Tag ID", field_heading(kind.date_field())];
    headers.extend(kind.detail_fields().iter().map(|f| field_heading(f)));
    headers.push("Last Updated");

    let mut table = Table::new(headers)
        .titled(kind.title())
        .when_empty(format!("No {} found.", kind.title().to_lowercase()));
    for record in records {
        let mut row = vec![
            record.id.clone().unwrap_or_default(),
            record.tag_id.clone().unwrap_or_else(|| "-".to_string()),
            health_cell(record, kind.date_field(), offset),
        ];
        row.extend(
            kind.detail_fields()
                .iter()
                .map(|f| health_cell(record, f, offset)),
        );
        row.push(health_cell(record, "updatedAt", offset));
        table.push(row);
    }
    table
}

/// `label: value` lines with the values aligned.
pub fn totals(lines: &[(&str, String)]) -> String {
    let width = lines.iter().map(|(k, _)| k.len() + 1).max().unwrap_or(0);
    lines
        .iter()
        .map(|(label, value)| format!("{:<width$} {value}", format!("{label}:")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn liters(v: f64) -> String {
    format!("{} liters", format_amount(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn health_table_follows_kind_columns() {
        let rec: HealthRecord = serde_json::from_value(json!({
            "_id": "h1",
            "tagId": "KE-001",
            "breedingDate": "2024-03-01T00:00:00.000Z",
            "result": "Positive",
            "updatedAt": "2024-03-02T10:00:00.000Z"
        }))
        .unwrap();
        let table = health_table(HealthKind::ReproductiveHealth, &[rec], utc());

        assert_eq!(table.headers[2], "Breeding Date");
        assert_eq!(table.headers.last().map(String::as_str), Some("Last Updated"));
        let row = &table.rows[0];
        assert_eq!(row[1], "KE-001");
        assert_eq!(row[2], "2024-03-01");
        assert_eq!(row[3], "-");
        assert_eq!(row[4], "Positive");
        assert_eq!(row.last().map(String::as_str), Some("2024-03-02"));
    }

    #[test]
    fn totals_align_values() {
        let text = totals(&[
            ("Total Feeds", "3".to_string()),
            ("Total Cost", "Ksh.180.00".to_string()),
        ]);
        assert_eq!(text, "Total Feeds: 3\nTotal Cost:  Ksh.180.00");
    }

    #[test]
    fn empty_health_table_names_the_kind() {
        let table = health_table(HealthKind::Vaccination, &[], utc());
        assert_eq!(table.empty_message, "No vaccinations found.");
    }

    #[test]
    fn animal_images_resolve_against_the_backend() {
        let api = DairyApiClient::new("http://farm.test/", std::time::Duration::from_secs(1), 1)
            .unwrap();
        let animals = vec![
            Animal {
                id: "a1".into(),
                tag_id: "KE-001".into(),
                breed: "Friesian".into(),
                image: Some("cow.jpg".into()),
            },
            Animal {
                id: "a2".into(),
                tag_id: "KE-002".into(),
                breed: "Jersey".into(),
                image: None,
            },
        ];
        let table = animals_table(&animals, &api);
        assert_eq!(table.rows[0][3], "http://farm.test/images/cow.jpg");
        assert_eq!(table.rows[1][3], "-");
    }
}
