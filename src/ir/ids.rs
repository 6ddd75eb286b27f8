#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VmValueId(pub u32);

impl VmValueId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}
