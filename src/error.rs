use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    /// Значение в хранилище не разбирается как снимок реестра.
    /// Наружу из register/tick не уходит: координатор считает снимок пустым.
    #[error("Повреждённый снимок реестра: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),

    #[error("Хранилище недоступно: {0}")]
    StoreUnavailable(String),

    #[error("Недопустимый ключ хранилища: {0}")]
    InvalidKey(String),

    #[error("Процесс уже снят с регистрации, повторная регистрация невозможна")]
    Terminated,

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn store_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(RegistryError::StoreUnavailable(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! registry_error {
    (store_unavailable, $($arg:tt)*) => {
        $crate::error::RegistryError::StoreUnavailable(format!($($arg)*))
    };
    (invalid_key, $($arg:tt)*) => {
        $crate::error::RegistryError::InvalidKey(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::RegistryError::Internal(format!($($arg)*))
    };
}
