//! User-facing reply catalog and rendering
//!
//! Every string the gateway sends lives here so the dialogue engine stays
//! free of copy. Reply order is composed by the engine; this module only
//! renders individual messages.

use crate::fields::{ReceiptField, ReceiptRecord};

/// Default reply for text received while waiting for a photo.
pub const UPLOAD_PROMPT: &str = "Please send the receipt image (photo).";

pub const DOWNLOAD_FAILED: &str = "⚠️ Could not download the receipt image. Please resend.";

pub const EXTRACTION_REJECTED: &str =
    "❌ Could not read any details from that receipt. Please resend a clearer image.";

pub const SUBMITTED: &str = "✅ Receipt submitted. Thank you!";

pub const CONFIRM_PROMPT: &str = "Reply 1 to submit or 2 to edit.";

pub const CONFIRM_RETRY: &str = "Please reply 1 to submit or 2 to edit.";

pub const INVALID_OPTION: &str = "Invalid option. Please choose 1-7.";

pub const INVALID_SELECTION: &str =
    "No valid field numbers found. Send numbers 1-5 separated by commas, e.g. 1,3.";

/// Replacement-value prompt for a single field.
pub fn field_prompt(field: ReceiptField) -> &'static str {
    match field {
        ReceiptField::Name => "Enter the customer name exactly as it should appear.",
        ReceiptField::Phone => "Enter the 10-digit phone number (digits only).",
        ReceiptField::Email => "Enter the email address, e.g. jane@mail.com.",
        ReceiptField::Amount => "Enter the amount, e.g. 1499.50.",
        ReceiptField::Date => "Enter the receipt date, e.g. 2024-03-21.",
    }
}

/// Example value used when illustrating comma-separated input.
fn sample_value(field: ReceiptField) -> &'static str {
    match field {
        ReceiptField::Name => "Jane Doe",
        ReceiptField::Phone => "9876543210",
        ReceiptField::Email => "jane@mail.com",
        ReceiptField::Amount => "1499.50",
        ReceiptField::Date => "2024-03-21",
    }
}

/// Receipt summary, fields in enumeration order. Unknown values render as
/// empty so the user can see what still needs editing.
pub fn render_summary(record: &ReceiptRecord) -> String {
    let mut output = String::from("*Receipt details*\n");
    for field in ReceiptField::ALL {
        output.push_str(&format!("\n{}: {}", field.label(), record.get(field)));
    }
    output
}

/// The seven-option edit menu. Field options are generated from the
/// enumeration so the digits always match `ReceiptField::from_menu_digit`.
pub fn render_edit_menu() -> String {
    let mut output = String::from("Which field would you like to change?\n");
    for (index, field) in ReceiptField::ALL.iter().enumerate() {
        output.push_str(&format!("\n{}. {}", index + 1, field.label()));
    }
    output.push_str("\n6. Finish editing");
    output.push_str("\n7. Edit multiple fields");
    output
}

pub fn render_multi_select_prompt() -> String {
    let mut output =
        String::from("Send the numbers of the fields to change, separated by commas (e.g. 1,3).\n");
    for (index, field) in ReceiptField::ALL.iter().enumerate() {
        output.push_str(&format!("\n{}. {}", index + 1, field.label()));
    }
    output
}

/// Prompt for the batch of replacement values, naming the selected fields in
/// the exact order the values must arrive.
pub fn render_multi_values_prompt(queue: &[ReceiptField]) -> String {
    let names = field_names(queue);
    let example = queue
        .iter()
        .map(|field| sample_value(*field))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Send new values for: {} (in that order), separated by commas.\nExample: {}",
        names, example
    )
}

pub fn render_count_mismatch(expected: usize) -> String {
    format!(
        "Expected {} comma-separated values. Please resend all {} values.",
        expected, expected
    )
}

pub fn render_value_updated(field: ReceiptField) -> String {
    format!("✅ {} updated.", field.label())
}

/// One consolidated message for a failed multi-field commit: every failing
/// field with its specific error, then the required order restated.
pub fn render_multi_errors(errors: &[(ReceiptField, String)], queue: &[ReceiptField]) -> String {
    let mut output = String::from("Some values were invalid:\n");
    for (field, message) in errors {
        output.push_str(&format!("\n- {}: {}", field.label(), message));
    }
    output.push_str(&format!(
        "\n\nResend all values in this order: {}.",
        field_names(queue)
    ));
    output
}

fn field_names(queue: &[ReceiptField]) -> String {
    queue
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_fields_in_enum_order() {
        let record = ReceiptRecord {
            name: "Jane Doe".to_string(),
            phone: "9876543210".to_string(),
            email: String::new(),
            amount: "1499.50".to_string(),
            date: "2024-03-21".to_string(),
        };
        let summary = render_summary(&record);

        let name_at = summary.find("Name: Jane Doe").unwrap();
        let phone_at = summary.find("Phone: 9876543210").unwrap();
        let email_at = summary.find("Email: ").unwrap();
        let amount_at = summary.find("Amount: 1499.50").unwrap();
        let date_at = summary.find("Date: 2024-03-21").unwrap();
        assert!(name_at < phone_at);
        assert!(phone_at < email_at);
        assert!(email_at < amount_at);
        assert!(amount_at < date_at);
    }

    #[test]
    fn test_edit_menu_has_all_seven_options() {
        let menu = render_edit_menu();
        for (index, field) in ReceiptField::ALL.iter().enumerate() {
            assert!(menu.contains(&format!("{}. {}", index + 1, field.label())));
        }
        assert!(menu.contains("6. Finish editing"));
        assert!(menu.contains("7. Edit multiple fields"));
    }

    #[test]
    fn test_multi_values_prompt_names_queue_in_order() {
        let prompt = render_multi_values_prompt(&[ReceiptField::Name, ReceiptField::Email]);
        assert!(prompt.contains("Name, Email"));
        assert!(prompt.contains("Jane Doe, jane@mail.com"));
    }

    #[test]
    fn test_count_mismatch_names_required_count() {
        let message = render_count_mismatch(3);
        assert!(message.contains("3"));
    }

    #[test]
    fn test_multi_errors_lists_each_failure_and_order() {
        let queue = [ReceiptField::Phone, ReceiptField::Email];
        let errors = vec![
            (ReceiptField::Phone, "Phone must be exactly 10 digits with no spaces or symbols, e.g. 9876543210.".to_string()),
        ];
        let message = render_multi_errors(&errors, &queue);
        assert!(message.contains("- Phone:"));
        assert!(message.contains("Phone, Email"));
    }
}
