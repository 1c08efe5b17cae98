//! User-facing form messages in the supported languages.

use crate::pipeline::RequestConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Es,
    En,
}

impl Lang {
    /// Anything that is not English reads as Spanish
    pub fn from_code(code: &str) -> Self {
        if code.to_ascii_lowercase().starts_with("en") {
            Lang::En
        } else {
            Lang::Es
        }
    }
}

impl From<&RequestConfig> for Lang {
    fn from(config: &RequestConfig) -> Self {
        Lang::from_code(&config.lang)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    EmailNotConfirmed,
    InvalidCredentials,
    PasswordsDoNotMatch,
    SignUpFailed,
    InvalidEmail,
    RecoveryEmailNotConfirmed,
    RecoveryEmailFailed,
    PasswordRequired,
    PasswordTooShort,
    SamePassword,
    PasswordUpdateFailed,
    MissingProfileFields,
    InvalidAccountType,
    UnknownCountry,
}

impl Message {
    pub fn text(self, lang: Lang) -> &'static str {
        use Message::*;
        match (self, lang) {
            (EmailNotConfirmed, Lang::Es) => "Debes confirmar tu correo electrónico antes de iniciar sesión.",
            (EmailNotConfirmed, Lang::En) => "You must confirm your email before signing in.",
            (InvalidCredentials, Lang::Es) => "Credenciales incorrectas. Verifica tu correo y contraseña.",
            (InvalidCredentials, Lang::En) => "Invalid credentials. Check your email and password.",
            (PasswordsDoNotMatch, Lang::Es) => "Las contraseñas no coinciden.",
            (PasswordsDoNotMatch, Lang::En) => "Passwords do not match.",
            (SignUpFailed, Lang::Es) => "Error al registrar. Intenta con otro correo.",
            (SignUpFailed, Lang::En) => "Sign-up failed. Try a different email.",
            (InvalidEmail, Lang::Es) => "Ingresa un correo electrónico válido.",
            (InvalidEmail, Lang::En) => "Enter a valid email address.",
            (RecoveryEmailNotConfirmed, Lang::Es) => {
                "Debes confirmar tu correo electrónico antes de solicitar un cambio de contraseña."
            }
            (RecoveryEmailNotConfirmed, Lang::En) => {
                "You must confirm your email before requesting a password change."
            }
            (RecoveryEmailFailed, Lang::Es) => {
                "No se pudo enviar el enlace de recuperación. Verifica el correo ingresado."
            }
            (RecoveryEmailFailed, Lang::En) => {
                "The recovery link could not be sent. Check the email you entered."
            }
            (PasswordRequired, Lang::Es) => "Debes ingresar y confirmar la nueva contraseña.",
            (PasswordRequired, Lang::En) => "Enter and confirm the new password.",
            (PasswordTooShort, Lang::Es) => "La contraseña debe tener al menos 8 caracteres.",
            (PasswordTooShort, Lang::En) => "The password must be at least 8 characters long.",
            (SamePassword, Lang::Es) => "Debes ingresar una contraseña diferente a la anterior.",
            (SamePassword, Lang::En) => "The new password must differ from the old one.",
            (PasswordUpdateFailed, Lang::Es) => "No se pudo actualizar la contraseña. Inténtalo nuevamente.",
            (PasswordUpdateFailed, Lang::En) => "The password could not be updated. Try again.",
            (MissingProfileFields, Lang::Es) => "Completa todos los campos obligatorios.",
            (MissingProfileFields, Lang::En) => "Fill in all required fields.",
            (InvalidAccountType, Lang::Es) => "Selecciona un tipo de cuenta válido.",
            (InvalidAccountType, Lang::En) => "Select a valid account type.",
            (UnknownCountry, Lang::Es) => "Selecciona un país válido.",
            (UnknownCountry, Lang::En) => "Select a valid country.",
        }
    }
}
