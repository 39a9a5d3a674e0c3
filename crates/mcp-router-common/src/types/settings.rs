use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub user_id: Option<String>,
    pub auth_token: Option<String>,
    pub package_manager_overlay_display_count: u32,
    pub show_window_on_startup: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            user_id: None,
            auth_token: None,
            package_manager_overlay_display_count: 0,
            show_window_on_startup: true,
        }
    }
}
