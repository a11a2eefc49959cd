mod dataset_detail;
mod dataset_list;
mod space;

pub use dataset_detail::DatasetDetailView;
pub use dataset_list::DatasetListView;
pub use space::SpaceView;
