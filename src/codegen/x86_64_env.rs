pub trait Env {
    const ENTRY_POINT: &str;

    /// Number of the `exit` system call, loaded into `rax`.
    const EXIT_SYSCALL: &str;

    const OBJECT_FORMAT: &str;
}

impl Env for Darwin {
    const ENTRY_POINT: &str = "_main";

    // BSD syscall class (0x2000000) | SYS_exit
    const EXIT_SYSCALL: &str = "0x2000001";

    const OBJECT_FORMAT: &str = "macho64";
}

impl Env for Linux {
    const ENTRY_POINT: &str = "_start";

    const EXIT_SYSCALL: &str = "60";

    const OBJECT_FORMAT: &str = "elf64";
}

pub struct Darwin;

pub struct Linux;
