use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tracing::{info, warn};

use crate::database::attendee_repo::{self, NewAttendee};
use crate::database::qr_code_repo;
use crate::database::registration_repo::{self, NewRegistration};
use crate::error::AppError;
use crate::models::{ProfileType, RegistrationKind};
use crate::services::dni_service::{generate_update_token, normalize_dni};
use crate::services::registration_service::is_valid_email;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Xlsx,
}

impl ImportFormat {
    pub fn from_file_name(name: &str) -> Option<ImportFormat> {
        let ext = name.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(ImportFormat::Csv),
            "xlsx" | "xlsm" => Some(ImportFormat::Xlsx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Dni,
    Profile,
    /// Free-form role column some sheets carry next to the profile.
    Role,
    Institution,
    Career,
    Occupation,
    WorkArea,
}

const ALIASES: &[(Column, &[&str])] = &[
    (Column::FirstName, &["NOMBRE", "NOMBRES", "FIRST NAME", "FIRSTNAME"]),
    (Column::LastName, &["APELLIDO", "APELLIDOS", "LAST NAME", "LASTNAME"]),
    (
        Column::FullName,
        &["NOMBRE COMPLETO", "NOMBRE Y APELLIDO", "APELLIDO Y NOMBRE", "FULL NAME"],
    ),
    (
        Column::Email,
        &["CORREO ELECTRONICO", "CORREO", "EMAIL", "E MAIL", "MAIL", "DIRECCION DE CORREO ELECTRONICO"],
    ),
    (
        Column::Phone,
        &[
            "NUMERO DE CELULAR CON CODIGO DE AREA",
            "NUMERO DE CELULAR",
            "CELULAR",
            "TELEFONO",
            "PHONE",
        ],
    ),
    (Column::Dni, &["DNI", "DOCUMENTO", "NUMERO DE DOCUMENTO", "NRO DE DOCUMENTO", "NRO DNI"]),
    (Column::Profile, &["TIPO DE PERFIL", "PERFIL", "PROFILE TYPE", "TIPO"]),
    (Column::Role, &["COLUMNA1", "ROL", "CARGO"]),
    (Column::Institution, &["INSTITUCION", "UNIVERSIDAD"]),
    (Column::Career, &["CARRERA"]),
    (Column::Occupation, &["OCUPACION"]),
    (Column::WorkArea, &["AREA DE TRABAJO", "AREA"]),
];

/// Upper-case, accents folded, punctuation dropped, single spaces.
pub fn fold_header(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' | 'Ñ' => 'N',
            c if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            _ => ' ',
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn match_column(header: &str) -> Option<Column> {
    let folded = fold_header(header);
    if folded.is_empty() {
        return None;
    }
    for (column, aliases) in ALIASES {
        if aliases.iter().any(|a| *a == folded) {
            return Some(*column);
        }
    }
    // Long descriptive headers ("Número de celular (con código de área) *"):
    // the longest alias that prefixes the header wins.
    ALIASES
        .iter()
        .flat_map(|(column, aliases)| aliases.iter().map(move |a| (*column, *a)))
        .filter(|(_, alias)| alias.len() >= 6 && folded.starts_with(alias))
        .max_by_key(|(_, alias)| alias.len())
        .map(|(column, _)| column)
}

fn map_headers(headers: &[String]) -> HashMap<Column, usize> {
    let mut map = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(column) = match_column(header) {
            map.entry(column).or_insert(idx);
        }
    }
    map
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| AppError::Import(format!("fila {} ilegible: {}", idx + 1, e)))?;
        rows.push(record.iter().map(|s| s.trim().to_string()).collect());
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // Spreadsheets store DNIs and phone numbers as floats.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Int(i) => i.to_string(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::Import(format!("archivo Excel inválido: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Import("el archivo no tiene hojas".to_string()))?
        .map_err(|e| AppError::Import(format!("no se pudo leer la hoja: {}", e)))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

pub fn read_table(bytes: &[u8], format: ImportFormat) -> Result<Vec<Vec<String>>, AppError> {
    match format {
        ImportFormat::Csv => read_csv(bytes),
        ImportFormat::Xlsx => read_xlsx(bytes),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Created,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowReport {
    /// 1-based spreadsheet row, header included.
    pub row: usize,
    pub status: RowStatus,
    pub email: Option<String>,
    pub reason: Option<String>,
    pub attendee_id: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub created: usize,
    pub skipped: usize,
    pub without_dni: usize,
    pub rows: Vec<RowReport>,
}

impl ImportReport {
    fn skip(&mut self, row: usize, email: Option<String>, reason: impl Into<String>) {
        self.skipped += 1;
        self.rows.push(RowReport {
            row,
            status: RowStatus::Skipped,
            email,
            reason: Some(reason.into()),
            attendee_id: None,
        });
    }
}

/// One spreadsheet row after column mapping and cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub raw_dni: Option<String>,
    pub profile: ProfileType,
    pub institution: Option<String>,
    pub career: Option<String>,
    pub occupation: Option<String>,
    pub work_area: Option<String>,
}

pub fn parse_row(columns: &HashMap<Column, usize>, row: &[String]) -> ImportRow {
    let get = |column: Column| -> Option<String> {
        columns
            .get(&column)
            .and_then(|idx| row.get(*idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let (mut first_name, mut last_name) = (get(Column::FirstName), get(Column::LastName));
    if first_name.is_none() && last_name.is_none() {
        if let Some(full) = get(Column::FullName) {
            let mut parts = full.split_whitespace();
            first_name = parts.next().map(str::to_string);
            let rest = parts.collect::<Vec<_>>().join(" ");
            last_name = (!rest.is_empty()).then_some(rest);
        }
    }

    // Empty profile means visitor; an unknown label is kept as OTHER. A
    // role column only fills in when the profile cell is blank.
    let profile = match get(Column::Profile) {
        Some(label) => ProfileType::parse(&label).unwrap_or(ProfileType::Other),
        None => get(Column::Role)
            .and_then(|role| ProfileType::parse(&role))
            .unwrap_or(ProfileType::Visitor),
    };

    ImportRow {
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        email: get(Column::Email).map(|e| e.to_lowercase()),
        phone: get(Column::Phone),
        raw_dni: get(Column::Dni),
        profile,
        institution: get(Column::Institution),
        career: get(Column::Career),
        occupation: get(Column::Occupation),
        work_area: get(Column::WorkArea),
    }
}

pub async fn import_attendees(
    state: &AppState,
    file_name: &str,
    bytes: &[u8],
) -> Result<ImportReport, AppError> {
    let format = ImportFormat::from_file_name(file_name).ok_or_else(|| {
        AppError::Import("Formato no soportado: subí un archivo .csv o .xlsx".to_string())
    })?;
    let mut table = read_table(bytes, format)?.into_iter();
    let headers = table
        .next()
        .ok_or_else(|| AppError::Import("El archivo está vacío".to_string()))?;
    let columns = map_headers(&headers);
    if !columns.contains_key(&Column::Email) {
        return Err(AppError::Import(
            "No se encontró la columna de correo electrónico".to_string(),
        ));
    }

    let mut report = ImportReport::default();
    let mut seen_emails: HashSet<String> = HashSet::new();
    let mut seen_dnis: HashSet<String> = HashSet::new();

    for (idx, cells) in table.enumerate() {
        let row_number = idx + 2;
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        report.total_rows += 1;
        let row = parse_row(&columns, &cells);

        let Some(email) = row.email.clone() else {
            report.skip(row_number, None, "sin email");
            continue;
        };
        if !is_valid_email(&email) {
            report.skip(row_number, Some(email), "email inválido");
            continue;
        }
        if row.first_name.is_empty() {
            report.skip(row_number, Some(email), "sin nombre");
            continue;
        }
        if seen_emails.contains(&email) || attendee_repo::email_exists(&state.pool, &email).await? {
            report.skip(row_number, Some(email), "email duplicado");
            continue;
        }

        let dni = row.raw_dni.as_deref().and_then(normalize_dni);
        if let Some(d) = &dni {
            if seen_dnis.contains(d) || attendee_repo::dni_exists(&state.pool, d).await? {
                report.skip(row_number, Some(email), format!("DNI duplicado ({})", d));
                continue;
            }
        }
        if dni.is_none() {
            if let Some(raw) = &row.raw_dni {
                warn!("📥 row {}: invalid DNI {:?} stored as absent", row_number, raw);
            }
        }
        let token = dni.is_none().then(generate_update_token);

        let now = Utc::now();
        let mut tx = state.pool.begin().await?;
        let attendee_id = attendee_repo::insert_attendee(
            &mut *tx,
            &NewAttendee {
                first_name: &row.first_name,
                last_name: &row.last_name,
                email: &email,
                phone: row.phone.as_deref(),
                dni: dni.as_deref(),
                dni_update_token: token.as_deref(),
                profile_type: row.profile.as_str(),
                is_unab_student: false,
                institution: row.institution.as_deref(),
                career: row.career.as_deref(),
                year_of_study: None,
                career_taught: None,
                work_area: row.work_area.as_deref(),
                occupation: row.occupation.as_deref(),
                group_name: None,
                group_municipality: None,
                group_size: None,
                representative_id: None,
                company_id: None,
                created_at: now,
            },
        )
        .await?;
        let registration_id = registration_repo::insert_registration(
            &mut *tx,
            &NewRegistration {
                attendee_id,
                company_id: None,
                event_name: &state.config.event_name,
                kind: RegistrationKind::Import.as_str(),
                registered_at: now,
            },
        )
        .await?;
        qr_code_repo::insert_qr_code(
            &mut *tx,
            registration_id,
            &uuid::Uuid::new_v4().to_string(),
            now,
        )
        .await?;
        tx.commit().await?;

        seen_emails.insert(email.clone());
        if let Some(d) = dni {
            seen_dnis.insert(d);
        } else {
            report.without_dni += 1;
        }
        report.created += 1;
        report.rows.push(RowReport {
            row: row_number,
            status: RowStatus::Created,
            email: Some(email),
            reason: None,
            attendee_id: Some(attendee_id),
        });
    }

    info!(
        "📥 import {}: {} created, {} skipped ({} without DNI)",
        file_name, report.created, report.skipped, report.without_dni
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_case_and_punctuation() {
        assert_eq!(
            fold_header("Número de celular (con código de área)"),
            "NUMERO DE CELULAR CON CODIGO DE AREA"
        );
        assert_eq!(fold_header("  correo   electrónico "), "CORREO ELECTRONICO");
    }

    #[test]
    fn matches_known_headers() {
        assert_eq!(match_column("NOMBRE"), Some(Column::FirstName));
        assert_eq!(match_column("Apellido"), Some(Column::LastName));
        assert_eq!(match_column("CORREO ELECTRONICO"), Some(Column::Email));
        assert_eq!(
            match_column("NUMERO DE CELULAR (con codigo de area)"),
            Some(Column::Phone)
        );
        assert_eq!(match_column("TIPO DE PERFIL"), Some(Column::Profile));
        assert_eq!(match_column("DNI"), Some(Column::Dni));
        assert_eq!(match_column("Columna1"), Some(Column::Role));
        assert_eq!(match_column("Observaciones"), None);
    }

    #[test]
    fn parses_rows_with_lenient_profiles() {
        let headers: Vec<String> = ["NOMBRE", "Apellido", "CORREO ELECTRONICO", "DNI", "TIPO DE PERFIL"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = map_headers(&headers);
        let row = |profile: &str| -> Vec<String> {
            ["Juan", "Pérez", "Juan@Example.com", "12.345.678", profile]
                .iter()
                .map(|s| s.to_string())
                .collect()
        };

        let parsed = parse_row(&columns, &row("Estudiante"));
        assert_eq!(parsed.email.as_deref(), Some("juan@example.com"));
        assert_eq!(parsed.profile, ProfileType::Student);
        assert_eq!(parsed.raw_dni.as_deref(), Some("12.345.678"));

        assert_eq!(parse_row(&columns, &row("Docente")).profile, ProfileType::Teacher);
        assert_eq!(parse_row(&columns, &row("")).profile, ProfileType::Visitor);
        assert_eq!(parse_row(&columns, &row("Astronauta")).profile, ProfileType::Other);
    }

    #[test]
    fn reads_semicolon_csv_with_bom() {
        let data = "\u{feff}NOMBRE;CORREO ELECTRONICO\nAna;ana@example.com\n";
        let rows = read_table(data.as_bytes(), ImportFormat::Csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["Ana".to_string(), "ana@example.com".to_string()]);
    }

    #[test]
    fn float_cells_become_integers() {
        assert_eq!(cell_to_string(&Data::Float(30123456.0)), "30123456");
        assert_eq!(cell_to_string(&Data::String(" x ".to_string())), "x");
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(ImportFormat::from_file_name("a.XLSX"), Some(ImportFormat::Xlsx));
        assert_eq!(ImportFormat::from_file_name("a.csv"), Some(ImportFormat::Csv));
        assert_eq!(ImportFormat::from_file_name("a.pdf"), None);
    }
}
