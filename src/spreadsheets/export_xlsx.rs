use crate::domain::view::PropertyView;
use crate::errors::ServerError;
use crate::responses::xlsx_response;
use crate::responses::ResultResp;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

const HEADERS: [&str; 11] = [
    "Id",
    "Address",
    "City",
    "State",
    "Zip",
    "Listing Type",
    "Price",
    "No Water",
    "No Wastewater",
    "Challenges",
    "Assessor URL",
];

fn cell_error(what: &str) -> impl Fn(XlsxError) -> ServerError + '_ {
    move |e| ServerError::XlsxError(format!("Failed to write {what}: {e}"))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Builds the workbook for a screened result set, one row per property.
pub fn screening_workbook(views: &[PropertyView<'_>]) -> Result<Vec<u8>, ServerError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(|e| {
                ServerError::XlsxError(format!("Failed to write header '{}': {}", header, e))
            })?;
    }

    for (i, view) in views.iter().enumerate() {
        let r = (i + 1) as u32;
        let record = view.record;
        let address = &record.address;

        worksheet
            .write_string(r, 0, &record.id)
            .map_err(cell_error("id"))?;
        worksheet
            .write_string(r, 1, address.street.as_deref().unwrap_or(""))
            .map_err(cell_error("address"))?;
        worksheet
            .write_string(r, 2, address.city.as_deref().unwrap_or(""))
            .map_err(cell_error("city"))?;
        worksheet
            .write_string(r, 3, address.state.as_deref().unwrap_or(""))
            .map_err(cell_error("state"))?;
        worksheet
            .write_string(r, 4, address.zip_code.as_deref().unwrap_or(""))
            .map_err(cell_error("zip"))?;
        worksheet
            .write_string(r, 5, record.listing_type.as_str())
            .map_err(cell_error("listing type"))?;
        worksheet
            .write_number(r, 6, record.price)
            .map_err(cell_error("price"))?;
        worksheet
            .write_string(r, 7, yes_no(record.has_no_water()))
            .map_err(cell_error("water access"))?;
        worksheet
            .write_string(r, 8, yes_no(record.has_no_wastewater()))
            .map_err(cell_error("wastewater access"))?;

        let challenges = view
            .challenges
            .iter()
            .map(|tag| tag.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        worksheet
            .write_string(r, 9, &challenges)
            .map_err(cell_error("challenges"))?;
        worksheet
            .write_string(r, 10, view.assessor_url)
            .map_err(cell_error("assessor url"))?;
    }

    worksheet.autofit();

    workbook
        .save_to_buffer()
        .map_err(|e| ServerError::XlsxError(format!("Failed to save workbook: {}", e)))
}

/// Attachment named after the state filter, or `all` without one.
pub fn export_properties_xlsx(views: &[PropertyView<'_>], state: Option<&str>) -> ResultResp {
    let buffer = screening_workbook(views)?;
    let label = state.unwrap_or("all").to_lowercase();
    xlsx_response(buffer, &format!("properties_{label}.xlsx"))
}
