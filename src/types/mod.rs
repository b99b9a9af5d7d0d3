//! Request and response shapes exchanged with the host.

pub mod requests;

pub use requests::{
    ChangeExpiration, ChangePassword, DeleteUserRequest, DeleteUserResponse, InitializeRequest,
    InitializeResponse, NewUserRequest, NewUserResponse, Statements, UpdateUserRequest,
    UpdateUserResponse, UsernameConfig,
};
