use std::fmt;

/// Builds a [`ParseError`] from a code and a format string.
macro_rules! err {
    ($code:ident, $msg:literal) => {
        $crate::error::ParseError::new($crate::error::ParseErrorCode::$code, $msg)
    };
    ($code:ident, $fmtstr:literal, $($args:tt)*) => {
        $crate::error::ParseError::new($crate::error::ParseErrorCode::$code, format!($fmtstr, $($args)*))
    };
}

/// Returns early with a [`ParseError`] built from a code and a format string.
macro_rules! fail {
    ($code:ident, $msg:literal) => {
        return Err(err!($code, $msg))
    };
    ($code:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err(err!($code, $fmtstr, $($args)*))
    };
}

/// Install/parse failure codes surfaced to the caller of a file-level parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseErrorCode {
    InvalidApk,
    OlderSdk,
    NotApk,
    BadManifest,
    UnexpectedException,
    NoCertificates,
    InconsistentCertificates,
    CertificateEncoding,
    BadPackageName,
    BadSharedUserId,
    ManifestMalformed,
    ManifestEmpty,
}

impl ParseErrorCode {
    /// Numeric value matching the platform install error codes.
    pub fn value(self) -> i32 {
        match self {
            ParseErrorCode::InvalidApk => -2,
            ParseErrorCode::OlderSdk => -12,
            ParseErrorCode::NotApk => -100,
            ParseErrorCode::BadManifest => -101,
            ParseErrorCode::UnexpectedException => -102,
            ParseErrorCode::NoCertificates => -103,
            ParseErrorCode::InconsistentCertificates => -104,
            ParseErrorCode::CertificateEncoding => -105,
            ParseErrorCode::BadPackageName => -106,
            ParseErrorCode::BadSharedUserId => -107,
            ParseErrorCode::ManifestMalformed => -108,
            ParseErrorCode::ManifestEmpty => -109,
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseErrorCode::InvalidApk => "INSTALL_FAILED_INVALID_APK",
            ParseErrorCode::OlderSdk => "INSTALL_FAILED_OLDER_SDK",
            ParseErrorCode::NotApk => "INSTALL_PARSE_FAILED_NOT_APK",
            ParseErrorCode::BadManifest => "INSTALL_PARSE_FAILED_BAD_MANIFEST",
            ParseErrorCode::UnexpectedException => "INSTALL_PARSE_FAILED_UNEXPECTED_EXCEPTION",
            ParseErrorCode::NoCertificates => "INSTALL_PARSE_FAILED_NO_CERTIFICATES",
            ParseErrorCode::InconsistentCertificates => {
                "INSTALL_PARSE_FAILED_INCONSISTENT_CERTIFICATES"
            }
            ParseErrorCode::CertificateEncoding => "INSTALL_PARSE_FAILED_CERTIFICATE_ENCODING",
            ParseErrorCode::BadPackageName => "INSTALL_PARSE_FAILED_BAD_PACKAGE_NAME",
            ParseErrorCode::BadSharedUserId => "INSTALL_PARSE_FAILED_BAD_SHARED_USER_ID",
            ParseErrorCode::ManifestMalformed => "INSTALL_PARSE_FAILED_MANIFEST_MALFORMED",
            ParseErrorCode::ManifestEmpty => "INSTALL_PARSE_FAILED_MANIFEST_EMPTY",
        };
        f.write_str(name)
    }
}

/// Result alias used throughout the parser.
pub type ParseResult<T> = Result<T, ParseError>;

/// A structured `(code, message)` failure, optionally wrapped in location contexts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    code: ParseErrorCode,
    msg: String,
    contexts: Vec<String>,
}

impl ParseError {
    pub fn new(code: ParseErrorCode, msg: impl Into<String>) -> Self {
        ParseError {
            code,
            msg: msg.into(),
            contexts: Vec::new(),
        }
    }

    /// Prefixes the message with an outer location, innermost context first.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.push(context.into());
        self
    }

    pub fn code(&self) -> ParseErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for context in self.contexts.iter().rev() {
            write!(f, "{}: ", context)?;
        }
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for ParseError {}

/// A recoverable problem recorded while parsing in lenient mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
