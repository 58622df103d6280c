use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL used to build emailed action links.
    pub base_url: String,
    pub token_expiration_days: i64,
    pub resend_api_key: String,
    pub email_from_address: String,
    pub email_from_name: String,
    /// Recipients of "shift reopened" alerts.
    pub admin_notification_emails: Vec<String>,
    /// Shared secret for the admin API surface (X-Admin-Key header).
    pub admin_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let base_url = env::var("APP_BASE_URL")
            .map_err(|_| "APP_BASE_URL must be set".to_string())?
            .trim_end_matches('/')
            .to_string();

        let token_expiration_days = match env::var("TOKEN_EXPIRATION_DAYS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|_| format!("TOKEN_EXPIRATION_DAYS is not a number: {raw}"))?,
            Err(_) => 14,
        };

        let resend_api_key =
            env::var("RESEND_API_KEY").map_err(|_| "RESEND_API_KEY must be set".to_string())?;

        let email_from_address =
            env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| "noreply@example.com".to_string());

        let email_from_name =
            env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Volunteer Shifts".to_string());

        let admin_notification_emails =
            parse_email_list(&env::var("ADMIN_NOTIFICATION_EMAILS").unwrap_or_default());

        let admin_api_key =
            env::var("ADMIN_API_KEY").map_err(|_| "ADMIN_API_KEY must be set".to_string())?;

        Ok(Self {
            database_url,
            base_url,
            token_expiration_days,
            resend_api_key,
            email_from_address,
            email_from_name,
            admin_notification_emails,
            admin_api_key,
        })
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_admin_emails() {
        let emails = parse_email_list("a@x.org, b@x.org ,, c@x.org");
        assert_eq!(emails, vec!["a@x.org", "b@x.org", "c@x.org"]);
    }

    #[test]
    fn empty_admin_email_list() {
        assert!(parse_email_list("").is_empty());
        assert!(parse_email_list(" , ").is_empty());
    }
}
