// Протокол: модель сообщений, валидация, транспорт и hand-off URI

pub mod handoff;
pub mod messages;
pub mod transport;
pub mod validation;
