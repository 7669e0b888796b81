// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed REST surface of the analytics platform.

pub const REGISTER: &str = "/api/v2/auth/user/register";
pub const AUTH_STATUS: &str = "/api/v2/auth/login/status";
pub const LOGIN: &str = "/api/user/login";
pub const LOGOUT: &str = "/api/user/logout";
pub const ENROLL: &str = "/api/v2/lms/course/enroll";
pub const UNENROLL: &str = "/api/v2/lms/course/unenroll";
pub const COURSES: &str = "/api/v2/lms/courses";
pub const CONFIG: &str = "/api/v2/data/config";
pub const SESSION_START: &str = "/api/v2/data/session/start";
pub const SESSION_END: &str = "/api/v2/data/session/end";
pub const DEVICE_UPDATE: &str = "/api/v2/data/game/device";
pub const SAVE_GAME: &str = "/api/v2/data/game";
pub const PLAYER_INFO: &str = "/api/v2/data/user/pref";
pub const EVENTS: &str = "/api/v2/data/events";

/// Default content type for request bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for opaque save blobs that are not JSON.
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
