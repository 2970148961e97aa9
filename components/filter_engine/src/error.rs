use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Io(err: io::Error) {
            display("engine io error: {}", err)
            cause(err)
            from()
        }
        Corrupt(msg: String) {
            display("engine data corrupt: {}", msg)
        }
        InvalidConfig(msg: String) {
            display("invalid engine config: {}", msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
