mod client;
mod oauth;

pub use client::{
    About, ApiErrorClass, DriveClient, DriveError, FOLDER_MIME_TYPE, File, FileList,
    MAX_PAGE_SIZE, User,
};
pub use oauth::{DRIVE_SCOPE, OAuthClient, OAuthError, OAuthToken, OUT_OF_BAND_REDIRECT};
pub use reqwest::StatusCode;
