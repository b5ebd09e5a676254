use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BufferSettings {
    pub signature_service_buffer: bool,
    pub facial_min: u32,
    pub brow_min: u32,
    pub lash_min: u32,
    pub waxing_min: u32,
    pub specialty_min: u32,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            signature_service_buffer: true,
            facial_min: 30,
            brow_min: 30,
            lash_min: 30,
            waxing_min: 30,
            specialty_min: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AdminSettings {
    pub buffers: BufferSettings,
    pub auto_block_sundays: bool,
    pub require_deposit: bool,
    pub email_notifications: bool,
    pub open_time: String,
    pub close_time: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            buffers: BufferSettings::default(),
            auto_block_sundays: true,
            require_deposit: false,
            email_notifications: true,
            open_time: "9:00 AM".to_string(),
            close_time: "9:00 PM".to_string(),
        }
    }
}
