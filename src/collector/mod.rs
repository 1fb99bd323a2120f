// ユーザからのメッセージ・リアクションを締め切り付きで収集するモジュール
mod collector;
mod hub;
mod menu;
mod prompt;
mod response;

pub use collector::*;
pub use hub::*;
pub use menu::*;
pub use prompt::*;
pub use response::*;
