use {crate::domain::error::EngineError, std::fmt, uuid::Uuid};

/// The five PIX key shapes the central bank registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixKeyKind {
    Cpf,
    Cnpj,
    Phone,
    Email,
    Random,
}

impl PixKeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpf => "cpf",
            Self::Cnpj => "cnpj",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for PixKeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a PIX key or reject it. Runs before any payload is encoded so a
/// typo'd key never reaches a payer's banking app.
pub fn classify(key: &str) -> Result<PixKeyKind, EngineError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EngineError::Validation("PIX key cannot be empty".into()));
    }

    if key.len() == 11 && key.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(PixKeyKind::Cpf);
    }
    if key.len() == 14 && key.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(PixKeyKind::Cnpj);
    }

    if let Some(digits) = key.strip_prefix("+55") {
        if (10..=11).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(PixKeyKind::Phone);
        }
    }

    if is_email(key) {
        return Ok(PixKeyKind::Email);
    }

    // Random (EVP) keys are UUIDs.
    if key.len() == 36 && Uuid::try_parse(key).is_ok() {
        return Ok(PixKeyKind::Random);
    }

    Err(EngineError::Validation(format!(
        "invalid PIX key format: {key}"
    )))
}

fn is_email(key: &str) -> bool {
    let Some((local, domain)) = key.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if key.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
