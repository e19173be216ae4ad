//! Opcode registry shared with the server.
//!
//! This is the versioned contract table both peers draw their (opcode,
//! category) pairs from. The connection core never reads it — opcodes and
//! categories travel through it as opaque integers — but embedding code and
//! the server must agree on exactly this table.
//!
//! `C_` constants are client-sent opcodes, `S_` constants server-sent.

// ── Auth category ──

/// Authentication and account management.
pub const CATEGORY_AUTH: u16 = 0x1;

/// Generic success response.
pub const C_OPCODE_AUTH_SUCCESS: u16 = 0x00;
/// data: `{ username: str, password: str }`
pub const C_OPCODE_AUTH_LOGIN: u16 = 0x10;
/// data: `{ token: str }`
pub const C_OPCODE_AUTH_LOGIN_WITH_TOKEN: u16 = 0x11;
/// data: `{ username: str, password: str }`
pub const C_OPCODE_AUTH_REGISTER: u16 = 0x20;
/// Asks whether registration is enabled on this server.
pub const C_OPCODE_AUTH_CHECK_REGISTER_ENABLED: u16 = 0x21;
/// data: `{ username: str }`
pub const C_OPCODE_AUTH_CHECK_USERNAME_EXIST: u16 = 0xf0;
/// Ends the authenticated session.
pub const C_OPCODE_AUTH_LOGOUT: u16 = 0xff;

/// Generic success response.
pub const S_OPCODE_AUTH_SUCCESS: u16 = 0x00;
/// Invalid username or wrong password.
pub const S_OPCODE_AUTH_LOGIN_FAILED_INVALID: u16 = 0x10;
/// The presented token has expired.
pub const S_OPCODE_AUTH_LOGIN_FAILED_TOK_EXPIRED: u16 = 0x11;
/// data: `{ token: str }`
pub const S_OPCODE_AUTH_LOGIN_SUCCESS: u16 = 0x12;
/// Registration rejected: username taken.
pub const S_OPCODE_AUTH_REGISTER_FAILED_USERNAME_TAKEN: u16 = 0x20;
/// Registration rejected: registering is disabled.
pub const S_OPCODE_AUTH_REGISTER_FAILED_DISABLED: u16 = 0x21;
/// The connection is already authenticated.
pub const S_OPCODE_AUTH_ERR_ALREADY_LOGGED_IN: u16 = 0xffff;

// ── User category ──

/// Per-user data: profile and project listings.
pub const CATEGORY_USER: u16 = 0x2;

/// Generic success response.
pub const C_OPCODE_USER_SUCCESS: u16 = 0x00;
/// Asks for the authenticated user's name.
pub const C_OPCODE_USER_GET_USERNAME: u16 = 0x01;
/// Asks for the full project list.
pub const C_OPCODE_USER_PROJECTS_RETRIEVE: u16 = 0x10;
/// data: `{ offset: u32, count: u32 }`
pub const C_OPCODE_USER_PROJECTS_RETRIEVE_PAGED: u16 = 0x11;
/// Asks for the total project count.
pub const C_OPCODE_USER_PROJECTS_RETRIEVE_TOTAL: u16 = 0x12;
/// data: `{ imgid: u32 }`
pub const C_OPCODE_USER_PROJECTS_RETRIEVE_IMAGE: u16 = 0x13;
/// Opens a project for editing.
pub const C_OPCODE_USER_PROJECT_OPEN: u16 = 0x1f;

/// Generic success response.
pub const S_OPCODE_USER_SUCCESS: u16 = 0x00;
/// data: `{ username: str }`
pub const S_OPCODE_USER_USERNAME_RESPONSE: u16 = 0x01;
/// data: `{ projects: [{ id: u32, title: str, lastedit: u64, created: u64, imgid: u32 }] }`
pub const S_OPCODE_USER_PROJECTS_RESPONSE: u16 = 0x10;
/// data: `{ total: u32 }`
pub const S_OPCODE_USER_PROJECTS_TOTAL_RESPONSE: u16 = 0x11;
/// data: `{ data: [u8] }`
pub const S_OPCODE_USER_PROJECTS_IMAGE_RESPONSE: u16 = 0x12;
/// The request requires an authenticated session.
pub const S_OPCODE_USER_ERR_NOT_AUTHENTICATED: u16 = 0xffff;

// ── Editor category ──

/// Editing session operations.
pub const CATEGORY_EDITOR: u16 = 0x3;

/// Generic success response.
pub const C_OPCODE_EDITOR_SUCCESS: u16 = 0x00;
/// Closes the open project.
pub const C_OPCODE_EDITOR_CLOSE_PROJECT: u16 = 0xff;

/// Generic success response.
pub const S_OPCODE_EDITOR_SUCCESS: u16 = 0x00;
