pub use ferry_core::*;

pub mod extractor {
    pub use ferry_extractor::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use ferry_fs::*;
}

#[cfg(feature = "opendal")]
pub mod opendal {
    pub use ferry_opendal::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use ferry_mock::*;
}

pub mod prelude {
    pub use ferry_core::prelude::*;
    pub use ferry_extractor::prelude::*;

    #[cfg(feature = "fs")]
    pub use ferry_fs::{AppDataDirectory, DirectoryAssets, PackageInfoFile};

    #[cfg(feature = "opendal")]
    pub use ferry_opendal::OpendalAssets;

    #[cfg(feature = "mock")]
    pub use ferry_mock::{MemoryAssets, UnavailableIdentity};
}
