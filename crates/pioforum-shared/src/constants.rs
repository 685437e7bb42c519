/// Application name
pub const APP_NAME: &str = "Pioexplore Forum";

/// Name of the channel created when a privileged identity finds no channels
pub const DEFAULT_CHANNEL_NAME: &str = "General";

/// Label used for anonymous identities without a display name
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous User";

/// Remote collection names
pub const CHANNELS_COLLECTION: &str = "channels";
pub const MESSAGES_COLLECTION: &str = "messages";
pub const PROFILES_COLLECTION: &str = "profiles";

/// Maximum channel name length in characters
pub const MAX_CHANNEL_NAME_LEN: usize = 64;

/// Maximum message length in characters
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Capacity of the store change-notification broadcast
pub const CHANGE_BUFFER: usize = 256;

/// Capacity of each live subscription's snapshot queue
pub const SNAPSHOT_BUFFER: usize = 16;

/// Default bounded-retry settings for opening subscriptions
pub const DEFAULT_SUBSCRIBE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 200;
pub const MAX_RETRY_DELAY_MS: u64 = 5_000;
