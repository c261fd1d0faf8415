//! Event reasons emitted by the machine actuator.

pub const CREATE_SUCCESS: &str = "CreateSuccess";
pub const CREATE_FAILURE: &str = "CreateFailure";
pub const UPDATE_SUCCESS: &str = "UpdateSuccess";
pub const UPDATE_FAILURE: &str = "UpdateFailure";
pub const DELETE_SUCCESS: &str = "DeleteSuccess";
pub const DELETE_FAILURE: &str = "DeleteFailure";
