mod idempotence;
mod scenarios;
mod stop_faults;
