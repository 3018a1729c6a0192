use garde::Validate;
use serde::Deserialize;

/// Checkout request body: the product being sold plus an optional buyer
/// e-mail forwarded to the processor.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePreferenceRequest {
    #[garde(dive)]
    pub product: ProductInput,
    #[garde(email)]
    pub buyer_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[garde(length(min = 1))]
    pub id: String,
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(range(min = 0.01))]
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, title: &str, price: f64, email: Option<&str>) -> CreatePreferenceRequest {
        CreatePreferenceRequest {
            product: ProductInput {
                id: id.to_string(),
                title: title.to_string(),
                price,
            },
            buyer_email: email.map(str::to_string),
        }
    }

    #[test]
    fn accepts_a_complete_product() {
        assert!(request("ebook-01", "Guia Completo", 49.9, None)
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_empty_id_and_title() {
        assert!(request("", "Guia", 49.9, None).validate().is_err());
        assert!(request("ebook-01", "", 49.9, None).validate().is_err());
    }

    #[test]
    fn rejects_a_free_product() {
        assert!(request("ebook-01", "Guia", 0.0, None).validate().is_err());
    }

    #[test]
    fn rejects_a_bad_buyer_email() {
        assert!(request("ebook-01", "Guia", 49.9, Some("not-an-email"))
            .validate()
            .is_err());
        assert!(request("ebook-01", "Guia", 49.9, Some("a@b.com"))
            .validate()
            .is_ok());
    }
}
