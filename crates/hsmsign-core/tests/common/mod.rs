pub mod hsm_server;
