mod helpers;
mod login;
mod mocks;
mod processing;
mod redirect;
