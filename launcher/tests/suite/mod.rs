#![cfg(unix)]

mod execute;
